use crate::automation::SearchResultItem;
use crate::config::FallbackMarkers;

/// True when the item looks like synthetic filler rather than a citation
/// found by live retrieval. Items missing a URL, title or source count as
/// filler.
pub fn is_fallback_result(item: &SearchResultItem, markers: &FallbackMarkers) -> bool {
    let Some(url) = item.url.as_deref().filter(|u| !u.trim().is_empty()) else {
        return true;
    };
    let Some(title) = item.title.as_deref().filter(|t| !t.trim().is_empty()) else {
        return true;
    };
    let Some(source) = item.source.as_deref().filter(|s| !s.trim().is_empty()) else {
        return true;
    };

    let url = url.to_ascii_lowercase();
    if markers
        .url
        .iter()
        .any(|marker| url.contains(&marker.to_ascii_lowercase()))
    {
        return true;
    }
    let title = title.to_lowercase();
    if markers
        .title
        .iter()
        .any(|marker| title.contains(&marker.to_lowercase()))
    {
        return true;
    }
    markers.source.iter().any(|marker| source == marker)
}

pub fn real_results<'a>(
    items: &'a [SearchResultItem],
    markers: &FallbackMarkers,
) -> Vec<&'a SearchResultItem> {
    items
        .iter()
        .filter(|item| !is_fallback_result(item, markers))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: &str, title: &str, source: &str) -> SearchResultItem {
        SearchResultItem {
            url: Some(url.to_string()),
            title: Some(title.to_string()),
            source: Some(source.to_string()),
            ..SearchResultItem::default()
        }
    }

    #[test]
    fn generic_title_and_source_are_fallback() {
        let markers = FallbackMarkers::default();
        assert!(is_fallback_result(
            &item("https://cms.gov/lcd", "Generic Policy Overview", "CMS"),
            &markers
        ));
        assert!(is_fallback_result(
            &item("https://cms.gov/lcd", "LCD L38358", "Generic"),
            &markers
        ));
        assert!(!is_fallback_result(
            &item("https://cms.gov/lcd", "LCD L38358", "GPT Search"),
            &markers
        ));
    }

    #[test]
    fn missing_fields_are_fallback() {
        let markers = FallbackMarkers::default();
        let mut missing_source = item("https://cms.gov/lcd", "LCD L38358", "CMS");
        missing_source.source = None;
        assert!(is_fallback_result(&missing_source, &markers));
        assert!(is_fallback_result(&SearchResultItem::default(), &markers));
    }
}
