use crate::answer::{Answer, RawAnswer};
use crate::error::EntryError;

pub(crate) fn point(raw: &RawAnswer, entry: &'static str) -> Result<Answer, EntryError> {
    let [lat, lon] = match raw {
        RawAnswer::Empty => return Ok(Answer::Empty),
        RawAnswer::Point(point) => *point,
        // "lat lon" as typed or as stored by older form versions
        RawAnswer::Text(text) if text.trim().is_empty() => return Ok(Answer::Empty),
        RawAnswer::Text(text) => parse_pair(text).ok_or(EntryError::InvalidCoordinates)?,
        _ => {
            return Err(EntryError::WrongShape {
                entry,
                expected: "a [latitude, longitude] pair",
            });
        }
    };
    if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
        return Err(EntryError::InvalidCoordinates);
    }
    Ok(Answer::Geo([lat, lon]))
}

fn parse_pair(text: &str) -> Option<[f64; 2]> {
    let mut parts = text.split_whitespace().map(str::parse::<f64>);
    let lat = parts.next()?.ok()?;
    let lon = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some([lat, lon])
}
