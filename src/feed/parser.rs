use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Errors produced while parsing a feed document
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Document has no root element")]
    Empty,
    #[error("Document ended inside <{0}>")]
    Truncated(String),
}

/// Parsed RSS channel. Missing elements are left as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    /// Items in document order
    pub items: Vec<RawItem>,
}

/// One `<item>` of a channel, fields as untyped text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Raw `pubDate` text, parsed later by the ingester
    pub pub_date: String,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    ChannelTitle,
    ChannelLink,
    ChannelDescription,
    ChannelLanguage,
    ItemTitle,
    ItemLink,
    ItemDescription,
    ItemPubDate,
}

/// Maps an element opened under `path` to the field it populates.
///
/// Only unprefixed names match, so `<atom:link>` next to `<link>` is ignored.
fn field_for(path: &[Vec<u8>], name: &[u8]) -> Option<Field> {
    match path {
        [_, channel] if channel == b"channel" => match name {
            b"title" => Some(Field::ChannelTitle),
            b"link" => Some(Field::ChannelLink),
            b"description" => Some(Field::ChannelDescription),
            b"language" => Some(Field::ChannelLanguage),
            _ => None,
        },
        [_, channel, item] if channel == b"channel" && item == b"item" => match name {
            b"title" => Some(Field::ItemTitle),
            b"link" => Some(Field::ItemLink),
            b"description" => Some(Field::ItemDescription),
            b"pubDate" => Some(Field::ItemPubDate),
            _ => None,
        },
        _ => None,
    }
}

fn opens_item(path: &[Vec<u8>], name: &[u8]) -> bool {
    matches!(path, [_, channel] if channel == b"channel") && name == b"item"
}

impl RawFeedDocument {
    fn assign(&mut self, field: Field, value: String) {
        match field {
            Field::ChannelTitle => self.title = value,
            Field::ChannelLink => self.link = value,
            Field::ChannelDescription => self.description = value,
            Field::ChannelLanguage => self.language = value,
            item_field => {
                let Some(item) = self.items.last_mut() else {
                    return;
                };
                match item_field {
                    Field::ItemTitle => item.title = value,
                    Field::ItemLink => item.link = value,
                    Field::ItemDescription => item.description = value,
                    Field::ItemPubDate => item.pub_date = value,
                    _ => {}
                }
            }
        }
    }
}

/// Parse an RSS 2.0 style document.
///
/// The root element name is not checked; `channel` must be its direct child
/// and `item` elements direct children of `channel`. Unknown elements and
/// attributes are ignored. Text inside nested markup of a field (e.g. inline
/// XHTML in a description) is concatenated into that field.
pub fn parse_document(bytes: &[u8]) -> Result<RawFeedDocument, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    let mut doc = RawFeedDocument::default();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut seen_root = false;
    // Field being captured and the depth of its element
    let mut capture: Option<(Field, usize)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if capture.is_none() {
                    if let Some(field) = field_for(&path, &name) {
                        capture = Some((field, path.len() + 1));
                        text.clear();
                    } else if opens_item(&path, &name) {
                        doc.items.push(RawItem::default());
                    }
                }
                seen_root = true;
                path.push(name);
            }
            Event::Empty(e) => {
                let name = e.name().into_inner();
                if capture.is_none() {
                    if let Some(field) = field_for(&path, name) {
                        doc.assign(field, String::new());
                    } else if opens_item(&path, name) {
                        doc.items.push(RawItem::default());
                    }
                }
                seen_root = true;
            }
            Event::End(_) => {
                path.pop();
                if let Some((field, depth)) = capture {
                    if path.len() < depth {
                        doc.assign(field, std::mem::take(&mut text));
                        capture = None;
                    }
                }
            }
            Event::Text(t) => {
                if capture.is_some() {
                    text.push_str(&t.unescape().map_err(quick_xml::Error::from)?);
                }
            }
            Event::CData(c) => {
                if capture.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = path.last() {
        return Err(ParseError::Truncated(
            String::from_utf8_lossy(open).into_owned(),
        ));
    }
    if !seen_root {
        return Err(ParseError::Empty);
    }

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
    <title>Example Blog</title>
    <link>https://example.com/</link>
    <atom:link href="https://example.com/rss" rel="self" type="application/rss+xml"/>
    <description>Posts &amp; notes</description>
    <language>en-us</language>
    <item>
        <title>First</title>
        <link>https://example.com/first</link>
        <guid isPermaLink="true">https://example.com/first</guid>
        <description><![CDATA[<p>Hello <b>world</b></p>]]></description>
        <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
    </item>
    <item>
        <title>Second</title>
        <link>https://example.com/second</link>
        <pubDate>Tue, 03 Jan 2006 10:00:00 +0000</pubDate>
    </item>
</channel>
</rss>"#;

    #[test]
    fn test_parse_full_document() {
        let doc = parse_document(FULL_RSS.as_bytes()).unwrap();

        assert_eq!(doc.title, "Example Blog");
        assert_eq!(doc.link, "https://example.com/");
        assert_eq!(doc.description, "Posts & notes");
        assert_eq!(doc.language, "en-us");
        assert_eq!(
            doc.items,
            vec![
                RawItem {
                    title: "First".into(),
                    link: "https://example.com/first".into(),
                    description: "<p>Hello <b>world</b></p>".into(),
                    pub_date: "Mon, 02 Jan 2006 15:04:05 -0700".into(),
                },
                RawItem {
                    title: "Second".into(),
                    link: "https://example.com/second".into(),
                    description: String::new(),
                    pub_date: "Tue, 03 Jan 2006 10:00:00 +0000".into(),
                },
            ]
        );
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let xml = r#"<rss><channel><item><title>Only title</title></item></channel></rss>"#;
        let doc = parse_document(xml.as_bytes()).unwrap();

        assert_eq!(doc.title, "");
        assert_eq!(doc.language, "");
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].title, "Only title");
        assert_eq!(doc.items[0].link, "");
        assert_eq!(doc.items[0].pub_date, "");
    }

    #[test]
    fn test_empty_elements_and_items() {
        let xml = r#"<rss><channel><title/><item/><item><description/></item></channel></rss>"#;
        let doc = parse_document(xml.as_bytes()).unwrap();

        assert_eq!(doc.title, "");
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[1].description, "");
    }

    #[test]
    fn test_channel_without_items() {
        let xml = r#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#;
        let doc = parse_document(xml.as_bytes()).unwrap();
        assert!(doc.items.is_empty());
    }

    #[test]
    fn test_document_without_channel() {
        let doc = parse_document(b"<html><body>not a feed</body></html>").unwrap();
        assert_eq!(doc, RawFeedDocument::default());
    }

    #[test]
    fn test_nested_items_are_not_channel_items() {
        let xml = r#"<rss><channel>
            <item><title>real</title></item>
            <extra><item><title>nested</title></item></extra>
        </channel></rss>"#;
        let doc = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].title, "real");
    }

    #[test]
    fn test_inline_markup_in_description_is_flattened() {
        let xml = r#"<rss><channel><item>
            <description>see <a href="x">this</a> link</description>
        </item></channel></rss>"#;
        let doc = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(doc.items[0].description, "see this link");
    }

    #[test]
    fn test_unclosed_tag_is_error() {
        let err = parse_document(b"<not valid xml").unwrap_err();
        assert!(matches!(err, ParseError::Xml(_) | ParseError::Truncated(_)));
    }

    #[test]
    fn test_truncated_document_is_error() {
        let err = parse_document(b"<rss><channel><item><title>x</title>").unwrap_err();
        assert!(matches!(err, ParseError::Truncated(_) | ParseError::Xml(_)));
    }

    #[test]
    fn test_mismatched_end_tag_is_error() {
        let err = parse_document(b"<rss><channel></rss></channel>").unwrap_err();
        assert!(matches!(err, ParseError::Xml(_)));
    }

    #[test]
    fn test_empty_body_is_error() {
        assert!(matches!(parse_document(b"").unwrap_err(), ParseError::Empty));
        assert!(matches!(
            parse_document(b"just some text").unwrap_err(),
            ParseError::Empty
        ));
    }
}
