//! Positional HTML extraction for list and detail pages
//!
//! The page layout is an external contract: which table holds the rows and
//! which cell holds which field come from [`LayoutConfig`], never from
//! inspecting the page.

use crate::config::LayoutConfig;
use crate::links::extract_record_id;
use crate::records::{CatalogRecord, DetailRecord};
use crate::ParseError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Rows extracted from one list page
#[derive(Debug, Clone, Default)]
pub struct ParsedListPage {
    /// Rows with a resolvable id, in document order
    pub records: Vec<CatalogRecord>,

    /// Data rows whose link had no usable id
    pub rows_without_id: usize,
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|_| ParseError::Selector(css.to_string()))
}

/// Trimmed text content of an element and all its descendants
fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Picks the `index`-th match of `tag` in document order
fn nth_element<'a>(
    document: &'a Html,
    tag: &'static str,
    index: usize,
    url: &str,
) -> Result<ElementRef<'a>, ParseError> {
    let sel = selector(tag)?;
    document
        .select(&sel)
        .nth(index)
        .ok_or_else(|| ParseError::MissingElement {
            url: url.to_string(),
            tag,
            index,
        })
}

/// Parses a list page into catalog records
///
/// Every `<tr>` of the designated table that has at least one `<td>` is a data
/// row. The link cell's `<a href>` carries the record id in `id_param`; rows
/// without one are counted and skipped.
///
/// # Arguments
///
/// * `html` - The page body
/// * `page_url` - Where the page was fetched from, for resolving relative links
/// * `layout` - Table and column positions
/// * `id_param` - Query parameter holding the id
///
/// # Returns
///
/// * `Ok(ParsedListPage)` - Extracted rows
/// * `Err(ParseError)` - The designated table does not exist
pub fn parse_list_page(
    html: &str,
    page_url: &Url,
    layout: &LayoutConfig,
    id_param: &str,
) -> Result<ParsedListPage, ParseError> {
    let document = Html::parse_document(html);
    let table = nth_element(&document, "table", layout.list_table_index, page_url.as_str())?;

    let tr = selector("tr")?;
    let td = selector("td")?;
    let anchor = selector("a")?;

    let mut parsed = ParsedListPage::default();

    for row in table.select(&tr) {
        let cells: Vec<ElementRef<'_>> = row.select(&td).collect();
        if cells.is_empty() {
            continue;
        }

        let id = cells
            .get(layout.list_link_column)
            .and_then(|cell| cell.select(&anchor).next())
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| extract_record_id(href, page_url, id_param));

        let Some(id) = id else {
            parsed.rows_without_id += 1;
            continue;
        };

        let column = |position: usize| {
            cells
                .get(position)
                .map(|c| text_of(*c))
                .unwrap_or_default()
        };
        let [standard_name, city, county, short_name, alias_name, used_name] =
            layout.list_summary_columns.map(column);

        parsed.records.push(CatalogRecord {
            id,
            standard_name,
            city,
            county,
            short_name,
            alias_name,
            used_name,
        });
    }

    Ok(parsed)
}

/// Parses a detail page into a detail record for `id`
///
/// Each field is the text of cell `detail_value_column` in its configured row
/// of the designated `<tbody>`. A missing row or cell yields an empty field;
/// a missing `<tbody>` is a parse error.
pub fn parse_detail_page(
    html: &str,
    page_url: &str,
    id: &str,
    layout: &LayoutConfig,
) -> Result<DetailRecord, ParseError> {
    let document = Html::parse_document(html);
    let tbody = nth_element(&document, "tbody", layout.detail_tbody_index, page_url)?;

    let tr = selector("tr")?;
    let td = selector("td")?;
    let rows: Vec<ElementRef<'_>> = tbody.select(&tr).collect();

    let field = |row: usize| {
        rows.get(row)
            .and_then(|r| r.select(&td).nth(layout.detail_value_column))
            .map(text_of)
            .unwrap_or_default()
    };

    let offsets = &layout.detail_rows;
    Ok(DetailRecord {
        id: id.to_string(),
        rome: field(offsets.rome),
        use_time: field(offsets.use_time),
        full_name: field(offsets.full_name),
        origin: field(offsets.origin),
        describe: field(offsets.describe),
        remark: field(offsets.remark),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> LayoutConfig {
        LayoutConfig {
            list_table_index: 1,
            detail_tbody_index: 0,
            ..LayoutConfig::default()
        }
    }

    fn page_url() -> Url {
        Url::parse("https://example.com/list/1.html").unwrap()
    }

    fn list_html(rows: &str) -> String {
        format!(
            r#"<html><body>
            <table><tr><td>navigation</td></tr></table>
            <table>
              <tr><th>Name</th><th>City</th></tr>
              {}
            </table></body></html>"#,
            rows
        )
    }

    fn row(name: &str, href: &str) -> String {
        format!(
            "<tr><td> {} </td><td>City</td><td>County</td><td>Short</td><td>Alias</td><td>Used</td><td><a href=\"{}\">more</a></td></tr>",
            name, href
        )
    }

    #[test]
    fn test_parse_list_rows() {
        let html = list_html(&format!(
            "{}{}",
            row("Alpha", "detail.aspx?ID=1"),
            row("Beta", "/detail.aspx?ID=2")
        ));

        let parsed = parse_list_page(&html, &page_url(), &layout(), "ID").unwrap();

        assert_eq!(parsed.rows_without_id, 0);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].id, "1");
        assert_eq!(parsed.records[0].standard_name, "Alpha");
        assert_eq!(parsed.records[0].used_name, "Used");
        assert_eq!(parsed.records[1].id, "2");
    }

    #[test]
    fn test_rows_without_id_are_skipped() {
        let html = list_html(&format!(
            "{}{}{}",
            row("NoParam", "detail.aspx?other=1"),
            "<tr><td>too</td><td>short</td></tr>",
            row("Good", "detail.aspx?ID=9")
        ));

        let parsed = parse_list_page(&html, &page_url(), &layout(), "ID").unwrap();

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].id, "9");
        assert_eq!(parsed.rows_without_id, 2);
    }

    #[test]
    fn test_missing_table_is_parse_error() {
        let html = "<html><body><table><tr><td>only one</td></tr></table></body></html>";
        let err = parse_list_page(html, &page_url(), &layout(), "ID").unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingElement { tag: "table", index: 1, .. }
        ));
    }

    #[test]
    fn test_parse_detail_fields_by_offset() {
        let html = r#"<html><body><table><tbody>
            <tr><td>Header</td><td>ignored</td></tr>
            <tr><td>Rome</td><td> Beijing </td></tr>
            <tr><td>Use time</td><td>1949</td></tr>
            <tr><td>Skipped</td><td>x</td></tr>
            <tr><td>Full name</td><td>Full Name</td></tr>
            <tr><td>Origin</td><td>River</td></tr>
            <tr><td>Describe</td><td>Flat</td></tr>
            <tr><td>Remark</td><td></td></tr>
        </tbody></table></body></html>"#;

        let record = parse_detail_page(html, "https://example.com/d?ID=5", "5", &layout()).unwrap();

        assert_eq!(record.id, "5");
        assert_eq!(record.rome, "Beijing");
        assert_eq!(record.use_time, "1949");
        assert_eq!(record.full_name, "Full Name");
        assert_eq!(record.origin, "River");
        assert_eq!(record.describe, "Flat");
        assert_eq!(record.remark, "");
    }

    #[test]
    fn test_detail_missing_rows_are_empty() {
        let html = r#"<table><tbody><tr><td>a</td><td>b</td></tr></tbody></table>"#;
        let record = parse_detail_page(html, "u", "5", &layout()).unwrap();
        assert_eq!(record.rome, "");
        assert_eq!(record.remark, "");
    }

    #[test]
    fn test_detail_missing_tbody_is_parse_error() {
        let html = "<html><body><p>Not found</p></body></html>";
        let err = parse_detail_page(html, "u", "5", &layout()).unwrap_err();
        assert!(matches!(err, ParseError::MissingElement { tag: "tbody", .. }));
    }
}
