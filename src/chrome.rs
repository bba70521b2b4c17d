use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::{CaptureScreenshotFormatOption, Viewport};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ChromeConfig;
use crate::page::Page;
use crate::selector::Query;

/// A launched browser and the single tab the run owns.
pub struct ChromeSession {
    browser: Browser,
    page: Arc<ChromePage>,
}

impl ChromeSession {
    pub fn launch(config: &ChromeConfig) -> Result<Self> {
        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-infobars"),
            OsStr::new("--window-position=0,0"),
        ];
        let ua_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));
        if let Some(ref ua_arg) = ua_arg {
            args.push(OsStr::new(ua_arg));
        }

        info!("🚀 Launching Chrome (headless: {})", config.headless);
        let browser = Browser::new(LaunchOptions {
            headless: config.headless,
            window_size: Some(config.window_size),
            path: config.path.clone(),
            idle_browser_timeout: config.launch_timeout.max(Duration::from_secs(60)),
            args,
            ..Default::default()
        })
        .context("failed to launch Chrome")?;

        let tab = browser.new_tab().context("failed to open a tab")?;
        tab.set_default_timeout(config.launch_timeout);

        Ok(Self {
            browser,
            page: Arc::new(ChromePage { tab }),
        })
    }

    pub fn page(&self) -> Arc<ChromePage> {
        Arc::clone(&self.page)
    }

    /// Closes the tab and shuts the browser process down.
    pub fn close(self) {
        if let Err(e) = self.page.tab.close(false) {
            warn!("⚠️ Failed to close tab cleanly: {}", e);
        }
        drop(self.browser);
        info!("🧹 Browser closed");
    }
}

pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab)).await?
    }

    async fn eval_raw(&self, script: String) -> Result<Value> {
        self.blocking(move |tab| {
            let result = tab.evaluate(&script, true)?;
            Ok(result.value.unwrap_or(Value::Null))
        })
        .await
    }

    /// Runs `body` against the resolved query and returns its JSON value.
    /// Page-side exceptions (including rejected CSS) come back as `Err`.
    async fn run_query(&self, selector: &str, body: &str) -> Result<Value> {
        let query = Query::parse(selector)?;
        let inner = query.resolver_script(body);
        let script = format!(
            "(() => {{ try {{ return JSON.stringify({{ ok: true, value: {inner} }}); }} \
             catch (e) {{ return JSON.stringify({{ ok: false, error: String((e && e.message) || e) }}); }} }})()"
        );

        let raw = self.eval_raw(script).await?;
        let text = raw
            .as_str()
            .ok_or_else(|| anyhow!("query `{}` returned no value", selector))?;
        let parsed: Value = serde_json::from_str(text)?;
        if parsed["ok"].as_bool() == Some(true) {
            Ok(parsed["value"].clone())
        } else {
            Err(anyhow!(
                "query `{}` failed in page: {}",
                selector,
                parsed["error"].as_str().unwrap_or("unknown error")
            ))
        }
    }
}

#[async_trait]
impl Page for ChromePage {
    async fn goto(&self, url: &str) -> Result<()> {
        info!("Navigating to: {}", url);
        let url = url.to_string();
        self.blocking(move |tab| {
            tab.navigate_to(&url)?;
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let value = self.run_query(selector, "return __els.length;").await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>> {
        let value = self
            .run_query(
                selector,
                "return __els.map(el => (el.innerText || el.textContent || '').trim());",
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn attributes(&self, selector: &str, name: &str) -> Result<Vec<Option<String>>> {
        let name = serde_json::to_string(name)?;
        let body = format!(
            "const n = {name}; return __els.map(el => \
             (typeof el[n] === 'string' && el[n] !== '') ? el[n] : el.getAttribute(n));"
        );
        let value = self.run_query(selector, &body).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn click(&self, selector: &str, index: usize) -> Result<()> {
        let body = format!(
            "const el = __els[{index}]; \
             if (!el) throw new Error('no element at index {index}'); \
             el.scrollIntoView({{ block: 'center' }}); el.click(); return true;"
        );
        self.run_query(selector, &body).await?;
        debug!("Clicked `{}` [{}]", selector, index);
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.blocking(move |tab| {
            tab.press_key(&key)?;
            Ok(())
        })
        .await
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.eval_raw(script.to_string()).await
    }

    async fn content(&self) -> Result<String> {
        self.blocking(|tab| tab.get_content()).await
    }

    async fn url(&self) -> Result<String> {
        self.blocking(|tab| Ok(tab.get_url())).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let size = self
            .eval_raw(
                "JSON.stringify([document.documentElement.scrollWidth, document.documentElement.scrollHeight])"
                    .to_string(),
            )
            .await?;
        let (width, height): (f64, f64) = size
            .as_str()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or((1920.0, 1080.0));

        self.blocking(move |tab| {
            tab.capture_screenshot(
                CaptureScreenshotFormatOption::Png,
                None,
                Some(Viewport {
                    x: 0.0,
                    y: 0.0,
                    width,
                    height,
                    scale: 1.0,
                }),
                true,
            )
        })
        .await
    }
}
