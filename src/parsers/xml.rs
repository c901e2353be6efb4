//! Small helpers shared by the XML based formats.

use geo::Point;
use quick_xml::events::{BytesCData, BytesStart, BytesText};

use crate::error::{ImportError, Result};

pub(crate) fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

pub(crate) fn attribute(format: &'static str, e: &BytesStart, name: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ImportError::format(format, err.to_string()))?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|err| ImportError::from_xml(format, err))?;
            return Ok(Some(value.trim().to_string()));
        }
    }
    Ok(None)
}

/// Read the `lat`/`lon` attribute pair of an element.
pub(crate) fn coordinates(format: &'static str, e: &BytesStart) -> Result<Point> {
    let element = local_name(e);
    let lat = attribute(format, e, "lat")?
        .ok_or_else(|| ImportError::format(format, format!("<{}> without lat", element)))?;
    let lon = attribute(format, e, "lon")?
        .ok_or_else(|| ImportError::format(format, format!("<{}> without lon", element)))?;

    let latitude = degrees(format, &lat, 90.0)?;
    let longitude = degrees(format, &lon, 180.0)?;
    Ok(Point::new(longitude, latitude))
}

fn degrees(format: &'static str, value: &str, limit: f64) -> Result<f64> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() <= limit => Ok(v),
        _ => Err(ImportError::format(
            format,
            format!("invalid coordinate '{}'", value),
        )),
    }
}

pub(crate) fn text(format: &'static str, e: &BytesText) -> Result<String> {
    let text = e.unescape().map_err(|err| ImportError::from_xml(format, err))?;
    Ok(text.into_owned())
}

pub(crate) fn cdata(e: BytesCData) -> String {
    String::from_utf8_lossy(&e.into_inner()).into_owned()
}

/// Difficulty and terrain ratings; anything unparsable is dropped.
pub(crate) fn rating(value: &str) -> Option<f32> {
    let rating = value.trim().replace(',', ".").parse::<f32>().ok()?;
    (1.0..=5.0).contains(&rating).then_some(rating)
}
