use super::xml::{attribute, cdata, coordinates, local_name, rating, text};
use super::{CacheParser, finalize_record, report_progress};
use crate::error::{ImportError, Result};
use crate::model::{CacheSize, CacheType, Geocache, Trackable};
use crate::progress::{ProgressHandler, ProgressTrackingReader};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::io::{BufReader, Read};
use tracing::debug;

const FORMAT: &str = "GPX";

/// Parse GPX 1.0/1.1 pocket queries and exports, including the Groundspeak
/// cache block (inline in `<wpt>` or wrapped in `<extensions>`).
pub struct GpxParser;

impl CacheParser for GpxParser {
    fn parse(
        &self,
        stream: &mut dyn Read,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<Vec<Geocache>> {
        let mut reader = Reader::from_reader(BufReader::new(ProgressTrackingReader::new(stream)));
        let mut buf = Vec::new();

        // local names of the open elements, root first
        let mut path: Vec<String> = Vec::new();
        let mut content = String::new();
        let mut current: Option<Waypoint> = None;
        let mut seen_root = false;
        let mut caches = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| ImportError::from_xml(FORMAT, e))?;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let name = local_name(e);
                    if !seen_root {
                        if name != "gpx" {
                            return Err(ImportError::format(
                                FORMAT,
                                format!("expected <gpx> root element, found <{}>", name),
                            ));
                        }
                        seen_root = true;
                    } else if path.is_empty() {
                        return Err(ImportError::format(
                            FORMAT,
                            format!("content after root element: <{}>", name),
                        ));
                    }

                    start_element(e, &name, &path, &mut current)?;
                    content.clear();

                    if matches!(event, Event::Start(_)) {
                        path.push(name);
                    } else if name == "wpt" && path.len() == 1 {
                        if let Some(cache) = current.take().and_then(Waypoint::into_cache) {
                            caches.push(cache);
                        }
                        report_progress(progress, reader.get_ref().get_ref().bytes_read())?;
                    }
                }
                Event::Text(ref e) => content.push_str(&text(FORMAT, e)?),
                Event::CData(e) => content.push_str(&cdata(e)),
                Event::End(_) => {
                    let name = path.pop().ok_or_else(|| {
                        ImportError::format(FORMAT, "closing tag without matching opening tag")
                    })?;

                    if name == "wpt" && path.len() == 1 {
                        if let Some(cache) = current.take().and_then(Waypoint::into_cache) {
                            caches.push(cache);
                        }
                        report_progress(progress, reader.get_ref().get_ref().bytes_read())?;
                    } else if let Some(wpt) = current.as_mut() {
                        wpt.apply(&path, &name, content.trim());
                    }
                    content.clear();
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !seen_root {
            return Err(ImportError::format(FORMAT, "document has no <gpx> root element"));
        }
        if let Some(open) = path.last() {
            return Err(ImportError::format(
                FORMAT,
                format!("unexpected end of document inside <{}>", open),
            ));
        }

        Ok(caches)
    }

    fn name(&self) -> &'static str {
        "GPX Parser"
    }
}

fn start_element(
    e: &BytesStart,
    name: &str,
    path: &[String],
    current: &mut Option<Waypoint>,
) -> Result<()> {
    let parent = path.last().map(String::as_str);

    if name == "wpt" && path.len() == 1 {
        *current = Some(Waypoint {
            cache: Geocache {
                coords: Some(coordinates(FORMAT, e)?),
                ..Default::default()
            },
            is_geocache: false,
            url_name: None,
        });
        return Ok(());
    }

    let Some(wpt) = current.as_mut() else {
        return Ok(());
    };

    match (parent, name) {
        (Some("wpt") | Some("extensions"), "cache") => {
            wpt.is_geocache = true;
            if let Some(archived) = attribute(FORMAT, e, "archived")? {
                wpt.cache.archived = archived.eq_ignore_ascii_case("true");
            }
            if let Some(available) = attribute(FORMAT, e, "available")? {
                wpt.cache.disabled = !available.eq_ignore_ascii_case("true");
            }
        }
        (Some("cache"), "travelbugs") => {
            wpt.cache.inventory.get_or_insert_with(Vec::new);
        }
        (Some("travelbugs"), "travelbug") => {
            let trackable = Trackable {
                geocode: attribute(FORMAT, e, "ref")?,
                id: attribute(FORMAT, e, "id")?,
                name: String::new(),
            };
            wpt.cache.inventory.get_or_insert_with(Vec::new).push(trackable);
        }
        _ => {}
    }
    Ok(())
}

/// A `<wpt>` being assembled.
struct Waypoint {
    cache: Geocache,
    is_geocache: bool,
    url_name: Option<String>,
}

impl Waypoint {
    /// Store the text content of a closed leaf element; `path` holds its
    /// ancestors.
    fn apply(&mut self, path: &[String], name: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        let parent = path.last().map(String::as_str).unwrap_or_default();
        let cache = &mut self.cache;

        match (parent, name) {
            ("wpt", "name") => cache.geocode = value.to_string(),
            ("wpt", "urlname") => self.url_name = Some(value.to_string()),
            ("wpt", "url") => cache.url = Some(value.to_string()),
            ("wpt", "time") => match DateTime::parse_from_rfc3339(value) {
                Ok(time) => cache.hidden = Some(time.with_timezone(&Utc)),
                Err(e) => debug!("Ignoring unparsable time '{}': {}", value, e),
            },
            ("wpt", "type") => {
                if value.starts_with("Geocache") {
                    self.is_geocache = true;
                    set_type(cache, value);
                }
            }
            ("cache", "name") => cache.name = value.to_string(),
            ("cache", "placed_by") => cache.owner = Some(value.to_string()),
            ("cache", "owner") => {
                cache.owner.get_or_insert_with(|| value.to_string());
            }
            ("cache", "type") => set_type(cache, value),
            ("cache", "container") => cache.size = CacheSize::from_name(value),
            ("cache", "difficulty") => cache.difficulty = rating(value),
            ("cache", "terrain") => cache.terrain = rating(value),
            ("cache", "short_description") => cache.short_description = Some(value.to_string()),
            ("cache", "long_description") => cache.description = Some(value.to_string()),
            ("cache", "encoded_hints") => cache.hint = Some(value.to_string()),
            ("travelbug", "name") => {
                if let Some(trackable) = cache.inventory.as_mut().and_then(|inv| inv.last_mut()) {
                    trackable.name = value.to_string();
                }
            }
            _ => {}
        }
    }

    fn into_cache(self) -> Option<Geocache> {
        let Waypoint {
            mut cache,
            is_geocache,
            url_name,
        } = self;

        if !is_geocache || cache.geocode.is_empty() {
            debug!("Skipping non-geocache waypoint '{}'", cache.geocode);
            return None;
        }
        if cache.name.is_empty() {
            cache.name = url_name.unwrap_or_else(|| cache.geocode.clone());
        }

        finalize_record(&mut cache);
        Some(cache)
    }
}

fn set_type(cache: &mut Geocache, value: &str) {
    let cache_type = CacheType::from_name(value);
    if cache_type != CacheType::Unknown {
        cache.cache_type = cache_type;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CancellationToken;

    const POCKET_QUERY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<gpx xmlns="http://www.topografix.com/GPX/1/0" version="1.0" xmlns:groundspeak="http://www.groundspeak.com/cache/1/0/1">
  <wpt lat="49.317517" lon="8.545083">
    <time>2010-07-11T07:00:00Z</time>
    <name>GC1BKP3</name>
    <desc>Die Schatzinsel / treasure island by Die unbekannten Schatzsucher, Traditional Cache (1.5/1)</desc>
    <url>http://www.geocaching.com/seek/cache_details.aspx?guid=abc</url>
    <urlname>Die Schatzinsel / treasure island</urlname>
    <sym>Geocache</sym>
    <type>Geocache|Traditional Cache</type>
    <groundspeak:cache id="1155976" available="True" archived="False">
      <groundspeak:name>Die Schatzinsel / treasure island</groundspeak:name>
      <groundspeak:placed_by>Die unbekannten Schatzsucher</groundspeak:placed_by>
      <groundspeak:owner id="2989467">Die unbekannten Schatzsucher</groundspeak:owner>
      <groundspeak:type>Traditional Cache</groundspeak:type>
      <groundspeak:container>Micro</groundspeak:container>
      <groundspeak:difficulty>1.5</groundspeak:difficulty>
      <groundspeak:terrain>1</groundspeak:terrain>
      <groundspeak:short_description html="False">Short &amp; sweet</groundspeak:short_description>
      <groundspeak:long_description html="True"><![CDATA[<p>Long</p>]]></groundspeak:long_description>
      <groundspeak:encoded_hints>Dose unter Stein</groundspeak:encoded_hints>
      <groundspeak:travelbugs>
        <groundspeak:travelbug id="1816401" ref="TB1KEZ9">
          <groundspeak:name>Deutschland Adler</groundspeak:name>
        </groundspeak:travelbug>
        <groundspeak:travelbug id="2011002" ref="TB2ABCD">
          <groundspeak:name>Geocoin</groundspeak:name>
        </groundspeak:travelbug>
      </groundspeak:travelbugs>
    </groundspeak:cache>
  </wpt>
  <wpt lat="49.3" lon="8.5">
    <name>PK1BKP3</name>
    <type>Waypoint|Parking Area</type>
  </wpt>
  <wpt lat="50.0" lon="9.0">
    <name>GC2XYZ1</name>
    <urlname>Archived Multi</urlname>
    <type>Geocache|Multi-cache</type>
    <groundspeak:cache id="2" available="False" archived="True">
      <groundspeak:type>Multi-cache</groundspeak:type>
      <groundspeak:container>Regular</groundspeak:container>
    </groundspeak:cache>
  </wpt>
</gpx>
"#;

    #[test]
    fn test_parse_pocket_query() {
        let mut input = POCKET_QUERY.as_bytes();
        let caches = GpxParser.parse(&mut input, None).unwrap();

        assert_eq!(caches.len(), 2);

        let first = &caches[0];
        assert_eq!(first.geocode, "GC1BKP3");
        assert_eq!(first.name, "Die Schatzinsel / treasure island");
        assert_eq!(first.owner.as_deref(), Some("Die unbekannten Schatzsucher"));
        assert_eq!(first.cache_type, CacheType::Traditional);
        assert_eq!(first.size, CacheSize::Micro);
        assert_eq!(first.difficulty, Some(1.5));
        assert_eq!(first.terrain, Some(1.0));
        assert_eq!(first.short_description.as_deref(), Some("Short & sweet"));
        assert_eq!(first.description.as_deref(), Some("<p>Long</p>"));
        assert_eq!(first.hint.as_deref(), Some("Dose unter Stein"));
        assert!(!first.archived);
        assert!(!first.disabled);
        let coords = first.coords.unwrap();
        assert_eq!(coords.y(), 49.317517);
        assert_eq!(coords.x(), 8.545083);
        assert_eq!(first.hidden.unwrap().to_rfc3339(), "2010-07-11T07:00:00+00:00");

        let inventory = first.inventory.as_ref().unwrap();
        assert_eq!(first.inventory_items, 2);
        assert_eq!(inventory[0].geocode.as_deref(), Some("TB1KEZ9"));
        assert_eq!(inventory[0].id.as_deref(), Some("1816401"));
        assert_eq!(inventory[0].name, "Deutschland Adler");
        assert_eq!(inventory[1].name, "Geocoin");

        let second = &caches[1];
        assert_eq!(second.geocode, "GC2XYZ1");
        assert_eq!(second.name, "Archived Multi");
        assert_eq!(second.cache_type, CacheType::Multi);
        assert!(second.archived);
        assert!(second.disabled);
        assert!(second.inventory.is_none());
        assert_eq!(second.inventory_items, 0);
        assert!(second.updated.is_some());
        assert_eq!(second.updated, second.detailed_update);
    }

    #[test]
    fn test_parse_gpx_11_extensions() {
        let gpx = r#"<gpx version="1.1" creator="test">
  <wpt lat="1.0" lon="2.0">
    <name>GC11111</name>
    <extensions>
      <groundspeak:cache xmlns:groundspeak="http://www.groundspeak.com/cache/1/0/1" archived="false" available="true">
        <groundspeak:name>Inside extensions</groundspeak:name>
        <groundspeak:type>Earthcache</groundspeak:type>
        <groundspeak:travelbugs/>
      </groundspeak:cache>
    </extensions>
  </wpt>
</gpx>"#;
        let mut input = gpx.as_bytes();
        let caches = GpxParser.parse(&mut input, None).unwrap();

        assert_eq!(caches.len(), 1);
        assert_eq!(caches[0].name, "Inside extensions");
        assert_eq!(caches[0].cache_type, CacheType::Earth);
        assert_eq!(caches[0].inventory, Some(Vec::new()));
        assert_eq!(caches[0].inventory_items, 0);
    }

    #[test]
    fn test_progress_reported_per_waypoint() {
        struct Counter(std::sync::Mutex<Vec<u64>>);
        impl ProgressHandler for Counter {
            fn is_cancelled(&self) -> bool {
                false
            }
            fn notify_progress(&self, bytes_read: u64) {
                self.0.lock().unwrap().push(bytes_read);
            }
        }

        let counter = Counter(Default::default());
        let mut input = POCKET_QUERY.as_bytes();
        GpxParser.parse(&mut input, Some(&counter)).unwrap();

        let seen = counter.0.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_cancelled_before_first_record() {
        let token = CancellationToken::new();
        token.cancel();
        let mut input = POCKET_QUERY.as_bytes();

        let err = GpxParser.parse(&mut input, Some(&token)).unwrap_err();
        assert!(err.is_cancelled());
    }

    /// Asks to stop as soon as it has seen one progress update.
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
    fn test_cancelled_between_waypoints() {
        let handler = StopAfterFirst::default();
        let mut input = POCKET_QUERY.as_bytes();

        let err = GpxParser.parse(&mut input, Some(&handler)).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(handler.updates.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_second_root_element() {
        let doc = r#"<gpx></gpx><foo><wpt lat="1" lon="2"><name>GC1</name><type>Geocache|X</type></wpt></foo>"#;
        let mut input = doc.as_bytes();
        let err = GpxParser.parse(&mut input, None).unwrap_err();
        assert!(matches!(err, ImportError::Format { .. }));

        let mut input = "<gpx/><gpx/>".as_bytes();
        let err = GpxParser.parse(&mut input, None).unwrap_err();
        assert!(matches!(err, ImportError::Format { .. }));
    }

    #[test]
    fn test_rejects_wrong_root() {
        let mut input = "<loc><waypoint/></loc>".as_bytes();
        let err = GpxParser.parse(&mut input, None).unwrap_err();
        assert!(matches!(err, ImportError::Format { .. }));
    }

    #[test]
    fn test_rejects_truncated_document() {
        let truncated = &POCKET_QUERY[..POCKET_QUERY.find("<wpt lat=\"50.0\"").unwrap()];
        let mut input = truncated.as_bytes();
        let err = GpxParser.parse(&mut input, None).unwrap_err();
        assert!(matches!(err, ImportError::Format { .. }));
    }

    #[test]
    fn test_rejects_plain_text() {
        let mut input = "this is not a gpx file".as_bytes();
        let err = GpxParser.parse(&mut input, None).unwrap_err();
        assert!(matches!(err, ImportError::Format { .. }));
    }

    #[test]
    fn test_rejects_waypoint_without_coordinates() {
        let mut input = "<gpx><wpt><name>GC1</name></wpt></gpx>".as_bytes();
        let err = GpxParser.parse(&mut input, None).unwrap_err();
        assert!(matches!(err, ImportError::Format { .. }));
    }
}
