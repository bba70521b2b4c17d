//! Section → row → cell walk over a rendered specifications panel.

use std::collections::HashSet;

use scraper::{ElementRef, Html};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

use crate::resolver::SelectorSet;
use crate::selector::{text_of, Query, SelectorError};

pub const UNKNOWN_SECTION: &str = "Unknown Section";

/// A cell value: plain text, or one entry per paragraph when the cell holds
/// several.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    Text(String),
    Lines(Vec<String>),
}

impl From<&str> for SpecValue {
    fn from(s: &str) -> Self {
        SpecValue::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct SpecEntry {
    pub label: String,
    pub value: SpecValue,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub specifications: Vec<SpecEntry>,
    pub spec_count: usize,
}

/// How a row splits into label and value.
#[derive(Debug, Clone)]
pub enum RowShape {
    /// First two `cell` matches are label and value; rows with fewer are skipped.
    Cells { cell: String },
    /// Label found through its own fallback chain, value by selector.
    Labelled { label: SelectorSet, value: String },
}

#[derive(Debug, Clone)]
pub struct ScrapeLayout {
    pub section: String,
    pub title: SelectorSet,
    pub row: String,
    pub row_shape: RowShape,
    /// Sub-elements that turn a value into a list when there are two or more.
    pub paragraph: String,
}

/// Section title → label → value, in DOM order. A repeated section title or
/// label replaces the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    sections: Vec<(String, Vec<(String, SpecValue)>)>,
}

impl ExtractionResult {
    pub fn from_sections(sections: &[SpecSection]) -> Self {
        let mut result = Self::default();
        for section in sections {
            let mut table: Vec<(String, SpecValue)> = Vec::new();
            for entry in &section.specifications {
                upsert(&mut table, entry.label.clone(), entry.value.clone());
            }
            upsert(&mut result.sections, section.title.clone(), table);
        }
        result
    }

    pub fn get(&self, title: &str) -> Option<&[(String, SpecValue)]> {
        self.sections
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, table)| table.as_slice())
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(t, _)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

fn upsert<V>(entries: &mut Vec<(String, V)>, key: String, value: V) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => entries.push((key, value)),
    }
}

struct Table<'a>(&'a [(String, SpecValue)]);

impl Serialize for Table<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, value) in self.0 {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (title, table) in &self.sections {
            map.serialize_entry(title, &Table(table))?;
        }
        map.end()
    }
}

/// Walks every section inside (or equal to) an element matched by
/// `container`. Selectors in title or label fallback chains that fail to
/// parse are skipped; the structural ones must be valid.
pub fn scrape_sections(
    html: &str,
    container: &str,
    layout: &ScrapeLayout,
) -> Result<Vec<SpecSection>, SelectorError> {
    let container = Query::parse(container)?;
    let section_q = Query::parse(&layout.section)?;
    let row_q = Query::parse(&layout.row)?;
    let paragraph_q = Query::parse(&layout.paragraph)?;
    let titles = lenient(&layout.title);
    let shape = CompiledShape::new(&layout.row_shape)?;

    let document = Html::parse_document(html);
    let scopes: HashSet<_> = container.select(&document).iter().map(|el| el.id()).collect();

    let sections = section_q
        .select(&document)
        .into_iter()
        .filter(|el| scopes.contains(&el.id()) || el.ancestors().any(|a| scopes.contains(&a.id())));

    let mut out = Vec::new();
    for section in sections {
        let title = titles
            .iter()
            .find_map(|q| q.select_in(section).first().map(|el| text_of(el).trim().to_string()))
            .unwrap_or_else(|| UNKNOWN_SECTION.to_string());

        let specifications: Vec<SpecEntry> = row_q
            .select_in(section)
            .into_iter()
            .filter_map(|row| shape.read(row, &paragraph_q))
            .collect();

        out.push(SpecSection {
            id: section.value().attr("id").map(str::to_string),
            title,
            spec_count: specifications.len(),
            specifications,
        });
    }
    Ok(out)
}

/// [`scrape_sections`] folded into the title → label → value mapping.
pub fn scrape(html: &str, container: &str, layout: &ScrapeLayout) -> Result<ExtractionResult, SelectorError> {
    Ok(ExtractionResult::from_sections(&scrape_sections(html, container, layout)?))
}

enum CompiledShape {
    Cells(Query),
    Labelled { label: Vec<Query>, value: Query },
}

impl CompiledShape {
    fn new(shape: &RowShape) -> Result<Self, SelectorError> {
        Ok(match shape {
            RowShape::Cells { cell } => CompiledShape::Cells(Query::parse(cell)?),
            RowShape::Labelled { label, value } => CompiledShape::Labelled {
                label: lenient(label),
                value: Query::parse(value)?,
            },
        })
    }

    fn read(&self, row: ElementRef<'_>, paragraph: &Query) -> Option<SpecEntry> {
        let (label, value) = match self {
            CompiledShape::Cells(cell) => {
                let cells = cell.select_in(row);
                if cells.len() < 2 {
                    return None;
                }
                (cells[0], cells[1])
            }
            CompiledShape::Labelled { label, value } => {
                let label = label.iter().find_map(|q| q.select_in(row).first().copied())?;
                let value = value.select_in(row).first().copied()?;
                (label, value)
            }
        };

        Some(SpecEntry {
            label: text_of(&label).trim().to_string(),
            value: read_value(value, paragraph),
        })
    }
}

fn read_value(cell: ElementRef<'_>, paragraph: &Query) -> SpecValue {
    let paragraphs = paragraph.select_in(cell);
    if paragraphs.len() >= 2 {
        SpecValue::Lines(paragraphs.iter().map(|p| text_of(p).trim().to_string()).collect())
    } else {
        SpecValue::Text(text_of(&cell).trim().to_string())
    }
}

fn lenient(set: &SelectorSet) -> Vec<Query> {
    set.iter().filter_map(|s| Query::parse(s).ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_layout() -> ScrapeLayout {
        ScrapeLayout {
            section: ".technical-content-section".to_string(),
            title: SelectorSet::new(["p.title"]),
            row: "tr.technical-content-item".to_string(),
            row_shape: RowShape::Cells {
                cell: "td".to_string(),
            },
            paragraph: "p".to_string(),
        }
    }

    const MODAL: &str = r#"
        <div class="teleport-modal_content">
            <div class="technical-content-section">
                <p class="title">  Màn hình </p>
                <table>
                    <tr class="technical-content-item"><td> Kích thước </td><td>6.36 inches</td></tr>
                    <tr class="technical-content-item"><td>Tính năng</td><td><p>HDR10+</p><p> Dolby Vision </p><p>120Hz</p></td></tr>
                    <tr class="technical-content-item"><td>only one cell</td></tr>
                </table>
            </div>
            <div class="technical-content-section">
                <p class="title">Camera sau</p>
                <table>
                    <tr class="technical-content-item"><td>Độ phân giải</td><td><p>50MP</p></td></tr>
                    <tr class="technical-content-item"><td>Quay video</td><td>8K@24fps</td></tr>
                    <tr class="technical-content-item"></tr>
                </table>
            </div>
        </div>
    "#;

    #[test]
    fn walks_sections_rows_and_cells() {
        let result = scrape(MODAL, ".teleport-modal_content", &table_layout()).unwrap();

        assert_eq!(result.titles().collect::<Vec<_>>(), vec!["Màn hình", "Camera sau"]);

        let display = result.get("Màn hình").unwrap();
        assert_eq!(display.len(), 2);
        assert_eq!(display[0], ("Kích thước".to_string(), "6.36 inches".into()));
        assert_eq!(
            display[1].1,
            SpecValue::Lines(vec!["HDR10+".into(), "Dolby Vision".into(), "120Hz".into()])
        );

        let camera = result.get("Camera sau").unwrap();
        assert_eq!(camera[0].1, SpecValue::Text("50MP".into()));
        assert_eq!(camera.len(), 2);
    }

    #[test]
    fn container_may_itself_be_a_section() {
        let sections = scrape_sections(
            MODAL,
            ".teleport-modal_content .technical-content-section",
            &table_layout(),
        )
        .unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].spec_count, 2);
    }

    #[test]
    fn sections_outside_container_are_ignored() {
        let html = format!("{MODAL}<div class='technical-content-section'><p class='title'>Stray</p></div>");
        let result = scrape(&html, ".teleport-modal_content", &table_layout()).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.get("Stray").is_none());
    }

    #[test]
    fn duplicate_titles_keep_last_write() {
        let html = r#"
            <div id="m">
                <div class="technical-content-section"><p class="title">Pin</p>
                    <table><tr class="technical-content-item"><td>Dung lượng</td><td>4000</td></tr></table></div>
                <div class="technical-content-section"><p class="title">Khác</p></div>
                <div class="technical-content-section"><p class="title">Pin</p>
                    <table><tr class="technical-content-item"><td>Sạc</td><td>90W</td></tr></table></div>
            </div>
        "#;
        let result = scrape(html, "#m", &table_layout()).unwrap();
        assert_eq!(result.titles().collect::<Vec<_>>(), vec!["Pin", "Khác"]);
        assert_eq!(result.get("Pin").unwrap(), &[("Sạc".to_string(), "90W".into())]);
    }

    #[test]
    fn labelled_rows_use_label_fallbacks() {
        let layout = ScrapeLayout {
            section: r#"[id^="spec-item-"]"#.to_string(),
            title: SelectorSet::new([".b2-semibold span"]),
            row: ".flex.gap-2.border-b".to_string(),
            row_shape: RowShape::Labelled {
                label: SelectorSet::new(["label[", ".text-textOnWhiteSecondary span", "[class*='w-2/5'] span"]),
                value: ".flex-1".to_string(),
            },
            paragraph: "p".to_string(),
        };
        let html = r#"
            <div id="spec-item-0">
                <div class="b2-semibold"><span>Bộ xử lý</span></div>
                <div class="flex gap-2 border-b">
                    <div class="w-2/5"><span>Chip</span></div>
                    <div class="flex-1"><p>Snapdragon 8 Elite</p></div>
                </div>
                <div class="flex gap-2 border-b">
                    <div class="text-textOnWhiteSecondary"><span>Nhân</span></div>
                </div>
            </div>
            <div id="spec-item-1">
                <div class="flex gap-2 border-b">
                    <div class="text-textOnWhiteSecondary"><span>RAM</span></div>
                    <div class="flex-1">12 GB</div>
                </div>
            </div>
        "#;

        let sections = scrape_sections(html, r#"[id^="spec-item-"]"#, &layout).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].id.as_deref(), Some("spec-item-0"));
        assert_eq!(sections[0].title, "Bộ xử lý");
        assert_eq!(
            sections[0].specifications,
            vec![SpecEntry {
                label: "Chip".into(),
                value: "Snapdragon 8 Elite".into()
            }]
        );
        assert_eq!(sections[1].title, UNKNOWN_SECTION);
        assert_eq!(sections[1].spec_count, 1);
    }

    #[test]
    fn serializes_in_dom_order_and_is_stable() {
        let first = serde_json::to_string_pretty(&scrape(MODAL, ".teleport-modal_content", &table_layout()).unwrap()).unwrap();
        let second = serde_json::to_string_pretty(&scrape(MODAL, ".teleport-modal_content", &table_layout()).unwrap()).unwrap();
        assert_eq!(first, second);

        let compact = serde_json::to_string(&scrape(MODAL, ".teleport-modal_content", &table_layout()).unwrap()).unwrap();
        assert!(compact.starts_with(r#"{"Màn hình":{"Kích thước":"6.36 inches","Tính năng":["HDR10+","Dolby Vision","120Hz"]}"#));
    }

    #[test]
    fn invalid_structural_selector_is_an_error() {
        let mut layout = table_layout();
        layout.row = "tr[".to_string();
        assert!(scrape(MODAL, ".teleport-modal_content", &layout).is_err());
    }
}
