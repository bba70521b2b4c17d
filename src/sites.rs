//! Per-site selector profiles. Markup changes belong here, not in code.

use std::time::Duration;

use crate::extractor::SnapshotProfile;
use crate::offers::{OfferProfile, PriceBlock};
use crate::resolver::SelectorSet;
use crate::scrape::{RowShape, ScrapeLayout};
use crate::variants::{CloseStrategy, VariantProfile};
use crate::wait::WaitPlan;

/// Specifications modal on cellphones.com.vn product pages.
pub fn cellphones_specs() -> SnapshotProfile {
    SnapshotProfile {
        settle: Duration::from_secs(3),
        trigger: SelectorSet::new([
            ".button__show-modal-technical",
            "button[data-modal='technical']",
            ".btn-technical",
            ".show-specs",
            "button:has-text('Thông số kỹ thuật')",
            "button:has-text('Chi tiết')",
        ]),
        content: WaitPlan::new(
            SelectorSet::new([
                ".teleport-modal_content .technical-content-section",
                ".modal .technical-content-section",
                ".popup .technical-content-section",
                ".overlay .technical-content-section",
                ".specifications-modal",
                ".tech-specs",
            ]),
            Duration::from_secs(10),
            Duration::from_secs(2),
        ),
        layout: ScrapeLayout {
            section: ".technical-content-section".to_string(),
            title: SelectorSet::new(["p.title"]),
            row: "tr.technical-content-item".to_string(),
            row_shape: RowShape::Cells {
                cell: "td".to_string(),
            },
            paragraph: "p".to_string(),
        },
    }
}

const FPT_BACKDROP: &str = ".Backdrop_backdrop__A7yIC";
const FPT_BACKDROP_DARK: &str = ".Backdrop_darkMode__eqwkh";
const FPT_BACKDROP_SHOWN: &str = ".Backdrop_showBackdrop__xvyWm";
const FPT_SPEC_ITEM: &str = "[id^=\"spec-item-\"]";

/// Storage × color variants and their specifications panel on fptshop.com.vn.
pub fn fpt_variants() -> VariantProfile {
    VariantProfile {
        settle: Duration::from_secs(3),
        storage_options: "div.flex.flex-col:has-text('Dung lượng') >> .flex.flex-wrap.gap-2 button".to_string(),
        color_options: "div.flex.flex-col:has-text('Màu sắc') >> .flex.flex-wrap.gap-2 button".to_string(),
        option_label: "span.b2-medium".to_string(),
        storage_settle: Duration::from_millis(2000),
        color_settle: Duration::from_millis(1500),
        price: SelectorSet::new(["[data-testid*=\"price\"]", ".price-product", "[class*=\"price-product\"]"]),
        sku_pattern: VariantProfile::default_sku_pattern(),
        specs_button: SelectorSet::new(["button:has-text('Xem tất cả thông số')"]),
        panel: WaitPlan::new(
            SelectorSet::new([FPT_SPEC_ITEM, ".Swipeable_swipeable__BTB2L [id^=\"spec-item-\"]"]),
            Duration::from_secs(4),
            Duration::from_secs(2),
        ),
        layout: ScrapeLayout {
            section: FPT_SPEC_ITEM.to_string(),
            title: SelectorSet::new([".b2-semibold span", ".text-textOnWhitePrimary.b2-semibold span"]),
            row: ".flex.gap-2.border-b, .flex.gap-2.border-b-iconDividerOnWhite".to_string(),
            row_shape: RowShape::Labelled {
                label: SelectorSet::new([
                    ".text-textOnWhiteSecondary span",
                    "[class*=\"w-2/5\"] span",
                ]),
                value: ".flex-1".to_string(),
            },
            paragraph: "p".to_string(),
        },
        close: vec![
            CloseStrategy::Click(SelectorSet::new([format!(
                "{FPT_BACKDROP}{FPT_BACKDROP_DARK}{FPT_BACKDROP_SHOWN}"
            )])),
            CloseStrategy::Click(SelectorSet::new([FPT_BACKDROP, FPT_BACKDROP_DARK, FPT_BACKDROP_SHOWN])),
            CloseStrategy::Key("Escape".to_string()),
        ],
        panel_markers: SelectorSet::new([
            FPT_BACKDROP,
            FPT_BACKDROP_SHOWN,
            FPT_SPEC_ITEM,
            ".Swipeable_swipeable__BTB2L",
        ]),
        close_settle: Duration::from_millis(1500),
        after_close: Duration::from_millis(2000),
    }
}

/// Per-color price and promotions on thegioididong.com.
pub fn thegioididong_offers() -> OfferProfile {
    OfferProfile {
        settle: Duration::from_secs(2),
        color_links: "div.scrolling_inner div.box03.color.group.desk a.box03__item".to_string(),
        price_blocks: vec![
            PriceBlock {
                container: "div.price-one".to_string(),
                current: "p.box-price-present".to_string(),
                original: "p.box-price-old".to_string(),
                discount: "p.box-price-percent".to_string(),
                installment: Some("span.label--black".to_string()),
            },
            PriceBlock {
                container: "div.bs_title div.bs_price".to_string(),
                current: "strong".to_string(),
                original: "em".to_string(),
                discount: "i".to_string(),
                installment: None,
            },
        ],
        location: "div#location-detail a".to_string(),
        promo_box: "div.block__promo".to_string(),
        promo_title: "p.pr-txtb".to_string(),
        promo_items: "div.divb-right p".to_string(),
        loyalty_points: "p.loyalty__main__point".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Query;

    fn assert_parses(selectors: impl IntoIterator<Item = String>) {
        for selector in selectors {
            assert!(Query::parse(&selector).is_ok(), "selector should parse: {selector}");
        }
    }

    #[test]
    fn profile_selectors_parse() {
        let specs = cellphones_specs();
        assert_parses(specs.trigger.to_vec());
        assert_parses(specs.content.selectors.to_vec());

        let variants = fpt_variants();
        assert_parses([
            variants.storage_options.clone(),
            variants.color_options.clone(),
            variants.layout.section.clone(),
            variants.layout.row.clone(),
        ]);
        assert_parses(variants.panel_markers.to_vec());
        assert_parses(variants.specs_button.to_vec());

        let offers = thegioididong_offers();
        assert_parses([offers.color_links, offers.location, offers.promo_items]);
    }

    #[test]
    fn primary_wait_gets_the_long_timeout() {
        let specs = cellphones_specs();
        assert_eq!(specs.content.primary_timeout, Duration::from_secs(10));
        assert_eq!(specs.content.fallback_timeout, Duration::from_secs(2));
        assert_eq!(specs.content.budget(), Duration::from_secs(20));
    }
}
