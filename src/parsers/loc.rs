use super::xml::{attribute, cdata, coordinates, local_name, rating, text};
use super::{CacheParser, finalize_record, read_all_text};
use crate::error::{ImportError, Result};
use crate::model::{CacheSize, CacheType, Geocache};
use crate::progress::ProgressHandler;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::io::Read;

const FORMAT: &str = "LOC";

/// Parse `.loc` waypoint files as exported by geocaching.com.
///
/// LOC files are small, so the whole document is read first (reporting
/// progress per line) and parsed afterwards.
pub struct LocParser;

impl CacheParser for LocParser {
    fn parse(
        &self,
        stream: &mut dyn Read,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<Vec<Geocache>> {
        let content = read_all_text(stream, progress)?;
        parse_loc(&content)
    }

    fn name(&self) -> &'static str {
        "LOC Parser"
    }
}

fn parse_loc(content: &str) -> Result<Vec<Geocache>> {
    let mut reader = Reader::from_str(content);

    let mut depth = 0usize;
    let mut seen_root = false;
    let mut current: Option<Geocache> = None;
    let mut value = String::new();
    let mut caches = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ImportError::from_xml(FORMAT, e))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let name = local_name(e);
                if !seen_root {
                    if name != "loc" {
                        return Err(ImportError::format(
                            FORMAT,
                            format!("expected <loc> root element, found <{}>", name),
                        ));
                    }
                    seen_root = true;
                } else if depth == 0 {
                    return Err(ImportError::format(
                        FORMAT,
                        format!("content after root element: <{}>", name),
                    ));
                }

                if name == "waypoint" && depth == 1 {
                    current = Some(Geocache::default());
                } else if let Some(cache) = current.as_mut() {
                    match name.as_str() {
                        "name" => {
                            if let Some(id) = attribute(FORMAT, e, "id")? {
                                cache.geocode = id;
                            }
                        }
                        "coord" => cache.coords = Some(coordinates(FORMAT, e)?),
                        _ => {}
                    }
                }
                value.clear();

                if matches!(event, Event::Start(_)) {
                    depth += 1;
                } else if name == "waypoint" {
                    // <waypoint/> carries nothing
                    current = None;
                }
            }
            Event::Text(ref e) => value.push_str(&text(FORMAT, e)?),
            Event::CData(e) => value.push_str(&cdata(e)),
            Event::End(ref e) => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ImportError::format(FORMAT, "closing tag without matching opening tag")
                })?;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

                if name == "waypoint" {
                    if let Some(mut cache) = current.take() {
                        if cache.geocode.is_empty() {
                            return Err(ImportError::format(FORMAT, "<waypoint> without id"));
                        }
                        if cache.name.is_empty() {
                            cache.name = cache.geocode.clone();
                        }
                        finalize_record(&mut cache);
                        caches.push(cache);
                    }
                } else if let Some(cache) = current.as_mut() {
                    apply(cache, &name, value.trim());
                }
                value.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(ImportError::format(FORMAT, "document has no <loc> root element"));
    }
    if depth != 0 {
        return Err(ImportError::format(FORMAT, "unexpected end of document"));
    }

    Ok(caches)
}

fn apply(cache: &mut Geocache, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    match name {
        "name" => {
            let (title, owner) = split_owner(value);
            cache.name = title.to_string();
            cache.owner = owner.map(str::to_string);
        }
        "type" => cache.cache_type = CacheType::from_name(value),
        "link" => cache.url = Some(value.to_string()),
        "difficulty" => cache.difficulty = rating(value),
        "terrain" => cache.terrain = rating(value),
        "container" => {
            cache.size = value
                .parse::<u8>()
                .map(CacheSize::from_loc_code)
                .unwrap_or_else(|_| CacheSize::from_name(value));
        }
        _ => {}
    }
}

/// LOC names read "<cache name> by <owner>".
fn split_owner(value: &str) -> (&str, Option<&str>) {
    match value.rsplit_once(" by ") {
        Some((title, owner)) if !title.trim().is_empty() && !owner.trim().is_empty() => {
            (title.trim(), Some(owner.trim()))
        }
        _ => (value, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CancellationToken;

    const LOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<loc version="1.0" src="Groundspeak">
<waypoint>
	<name id="OC5952"><![CDATA[Die Schatzinsel / treasure island by Die unbekannten Schatzsucher]]></name>
	<coord lat="49.317517" lon="8.545083"/>
	<type>Geocache</type>
	<link text="Cache Details">http://www.geocaching.com/seek/cache_details.aspx?wp=OC5952</link>
	<difficulty>1.5</difficulty>
	<terrain>2</terrain>
	<container>2</container>
</waypoint>
<waypoint>
	<name id="GCABC12"><![CDATA[Plain name]]></name>
	<coord lat="-33.5" lon="151.25"/>
	<type>Geocache</type>
	<container>8</container>
</waypoint>
</loc>
"#;

    #[test]
    fn test_parse_loc() {
        let mut input = LOC.as_bytes();
        let caches = LocParser.parse(&mut input, None).unwrap();

        assert_eq!(caches.len(), 2);

        let first = &caches[0];
        assert_eq!(first.geocode, "OC5952");
        assert_eq!(first.name, "Die Schatzinsel / treasure island");
        assert_eq!(first.owner.as_deref(), Some("Die unbekannten Schatzsucher"));
        assert_eq!(first.difficulty, Some(1.5));
        assert_eq!(first.terrain, Some(2.0));
        assert_eq!(first.size, CacheSize::Micro);
        assert_eq!(
            first.url.as_deref(),
            Some("http://www.geocaching.com/seek/cache_details.aspx?wp=OC5952")
        );
        let coords = first.coords.unwrap();
        assert_eq!(coords.y(), 49.317517);
        assert_eq!(coords.x(), 8.545083);
        assert!(first.inventory.is_none());
        assert_eq!(first.inventory_items, 0);
        assert_eq!(first.updated, first.detailed_update);

        let second = &caches[1];
        assert_eq!(second.geocode, "GCABC12");
        assert_eq!(second.name, "Plain name");
        assert!(second.owner.is_none());
        assert_eq!(second.size, CacheSize::Small);
    }

    #[test]
    fn test_split_owner_uses_last_by() {
        assert_eq!(
            split_owner("Stand by me by Someone"),
            ("Stand by me", Some("Someone"))
        );
        assert_eq!(split_owner("No owner"), ("No owner", None));
    }

    #[test]
    fn test_cancelled_before_first_record() {
        let token = CancellationToken::new();
        token.cancel();
        let mut input = LOC.as_bytes();

        let err = LocParser.parse(&mut input, Some(&token)).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[derive(Default)]
    struct StopAfterFirst {
        token: CancellationToken,
        updates: std::sync::Mutex<Vec<u64>>,
    }

    impl ProgressHandler for StopAfterFirst {
        fn is_cancelled(&self) -> bool {
            self.token.is_cancelled()
        }

        fn notify_progress(&self, bytes_read: u64) {
            self.updates.lock().unwrap().push(bytes_read);
            self.token.cancel();
        }
    }

    #[test]
    fn test_cancelled_after_first_line() {
        let handler = StopAfterFirst::default();
        let mut input = LOC.as_bytes();

        let err = LocParser.parse(&mut input, Some(&handler)).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(handler.updates.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_second_root_element() {
        let doc = r#"<loc></loc><loc><waypoint><name id="GC1">A</name></waypoint></loc>"#;
        let mut input = doc.as_bytes();
        let err = LocParser.parse(&mut input, None).unwrap_err();
        assert!(matches!(err, ImportError::Format { .. }));
    }

    #[test]
    fn test_rejects_truncated_document() {
        let truncated = &LOC[..LOC.find("<container>8").unwrap()];
        let mut input = truncated.as_bytes();
        let err = LocParser.parse(&mut input, None).unwrap_err();
        assert!(matches!(err, ImportError::Format { .. }));
    }

    #[test]
    fn test_rejects_gpx_document() {
        let mut input = "<gpx><wpt lat=\"1\" lon=\"1\"/></gpx>".as_bytes();
        let err = LocParser.parse(&mut input, None).unwrap_err();
        assert!(matches!(err, ImportError::Format { .. }));
    }

    #[test]
    fn test_rejects_waypoint_without_id() {
        let mut input = "<loc><waypoint><name>Nameless</name></waypoint></loc>".as_bytes();
        let err = LocParser.parse(&mut input, None).unwrap_err();
        assert!(matches!(err, ImportError::Format { .. }));
    }
}
