//! Adabas format buffers: parsing a format buffer into field specs, and
//! generating one from a layout.

use pest::Parser;
use pest_derive::Parser as PestParser;

use crate::error::{DatamapError, ErrorKind, Result};
use crate::field::{self, FieldSpec, FieldType};
use crate::layout::Layout;

#[derive(PestParser)]
#[grammar = "fbuf.pest"]
struct FormatBufferParser;

fn fb_err(detail: impl Into<String>) -> DatamapError {
    DatamapError::new("fbuf", ErrorKind::FormatBuffer(detail.into()))
}

/// Parse a format buffer such as `AA,6,A,AB1-3,2,F,10X.` into field specs.
/// Each field is named by its Adabas short name; `nX` skips become
/// unlisted fillers.
///
/// ```
/// use datamap::{fbuf, FieldType, Layout};
///
/// let specs = fbuf::parse("AA,6,A,AB1-3,2,F,4X,AC,3,P.").unwrap();
/// let layout = Layout::new("fb", specs).unwrap();
/// assert_eq!(layout.size(), 6 + 3 * 2 + 4 + 3);
/// assert_eq!(layout.field("AB").unwrap().field_type(), FieldType::Int2);
/// assert_eq!(layout.format_buffer(), "AA,6,A,AB1-3,2,F,4X,AC,3,P.");
/// ```
pub fn parse(src: &str) -> Result<Vec<FieldSpec>> {
    let pairs = FormatBufferParser::parse(Rule::format_buffer, src)
        .map_err(|e| fb_err(format!("parse error: {e}")))?;
    let root = pairs.into_iter().next().ok_or_else(|| fb_err("empty parse"))?;

    let mut specs = Vec::new();
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::skip => {
                let len = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| fb_err("skip without length"))?;
                let n = number(len.as_str())?;
                specs.push(field::filler(format!("filler{}", specs.len()), n));
            }
            Rule::field => specs.push(build_field(pair)?),
            _ => {}
        }
    }
    Ok(specs)
}

fn number(s: &str) -> Result<usize> {
    s.parse::<usize>()
        .map_err(|_| fb_err(format!("invalid number '{s}'")))
}

fn build_field(pair: pest::iterators::Pair<Rule>) -> Result<FieldSpec> {
    let mut name = String::new();
    let mut occurs = None;
    let mut length = None;
    let mut format = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => name = inner.as_str().to_string(),
            Rule::range => {
                let (lo, hi) = inner
                    .as_str()
                    .split_once('-')
                    .ok_or_else(|| fb_err(format!("invalid range '{}'", inner.as_str())))?;
                let (lo, hi) = (number(lo)?, number(hi)?);
                if lo == 0 || hi < lo {
                    return Err(fb_err(format!("invalid range '{}' for {name}", inner.as_str())));
                }
                occurs = Some(hi - lo + 1);
            }
            Rule::length => length = Some(number(inner.as_str())?),
            Rule::format => format = Some(inner.as_str().to_string()),
            _ => {}
        }
    }
    let length = length.ok_or_else(|| fb_err(format!("field {name} has no length")))?;
    let spec = match format.as_deref() {
        None | Some("B") => field::bytes(&name, length),
        Some("A") => field::string(&name, length),
        Some("P") => field::packed(&name, length),
        Some("U") => field::unpacked(&name, length),
        Some("F") => {
            let ftype = match length {
                1 => FieldType::Int1,
                2 => FieldType::Int2,
                4 => FieldType::Int4,
                8 => FieldType::Int8,
                n => return Err(fb_err(format!("field {name}: F format with length {n}"))),
            };
            FieldSpec::new(&name, ftype, length)
        }
        Some("G") => match length {
            4 => field::float(&name),
            8 => field::double(&name),
            n => return Err(fb_err(format!("field {name}: G format with length {n}"))),
        },
        Some("W") if length % 2 == 0 => field::unicode(&name, length / 2),
        Some(f) => return Err(fb_err(format!("field {name}: format {f} with length {length}"))),
    };
    let spec = spec.adabas_name(name);
    Ok(match occurs {
        Some(n) => spec.occurs(n),
        None => spec,
    })
}

impl Layout {
    /// Format buffer reading the fields that carry an Adabas name; other
    /// fields are skipped with `nX`.
    pub fn format_buffer(&self) -> String {
        let items: Vec<String> = self
            .fields
            .iter()
            .map(|f| match f.adabas_name() {
                Some(fname) => {
                    let occ = if f.is_repeating() && f.occurs() > 1 {
                        format!("1-{}", f.occurs())
                    } else {
                        String::new()
                    };
                    match f.field_type().adabas_format() {
                        Some(fmt) => format!("{fname}{occ},{},{fmt}", f.size()),
                        None => format!("{fname}{occ},{}", f.size()),
                    }
                }
                None => format!("{}X", f.size() * f.occurs()),
            })
            .collect();
        format!("{}.", items.join(","))
    }

    /// Adabas name, length and format letter of a field that has an
    /// Adabas name. The format is empty for plain byte fields.
    pub fn field_definition(&self, name: &str) -> Option<(String, usize, &'static str)> {
        let f = self.field(name)?;
        let fname = f.adabas_name()?;
        Some((
            fname.to_string(),
            f.size(),
            f.field_type().adabas_format().unwrap_or(""),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldOpts;

    #[test]
    fn test_parse_types() {
        let specs = parse("AA,6,A,AB,2,F,AC,8,G,AD,4,W,AE,3,U,AF,5.").expect("parse");
        let types: Vec<FieldType> = specs.iter().map(|s| s.field_type()).collect();
        assert_eq!(
            types,
            vec![
                FieldType::String,
                FieldType::Int2,
                FieldType::Double,
                FieldType::Utf16,
                FieldType::Unpacked,
                FieldType::Bytes,
            ]
        );
        assert_eq!(specs[3].size(), 2);
    }

    #[test]
    fn test_parse_skip_and_whitespace() {
        let specs = parse(" AA , 2 , A ,\n10X , AB1-4,1,B").expect("parse");
        assert_eq!(specs.len(), 3);
        assert!(specs[1].options().contains(FieldOpts::NONE));
        assert_eq!(specs[1].size(), 10);
        let layout = Layout::new("fb", specs).expect("layout");
        assert_eq!(layout.field("AB").map(|f| f.occurs()), Some(4));
        assert_eq!(layout.size(), 2 + 10 + 4);
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["AA,3,F.", "AA,6,A,", "AA.", "AB3-1,2,F.", "AA,5,W.", "AA,6,Q."] {
            let err = parse(bad).unwrap_err();
            assert!(
                matches!(err.kind(), ErrorKind::FormatBuffer(_)),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn test_generate() {
        let layout = Layout::new(
            "mymap",
            [
                field::string("foo", 6).adabas_name("AA"),
                field::int2("bar").adabas_name("AB").occurs(3),
                field::uint1("x"),
            ],
        )
        .expect("layout");
        assert_eq!(layout.format_buffer(), "AA,6,A,AB1-3,2,F,1X.");
        assert_eq!(
            layout.field_definition("foo"),
            Some(("AA".to_string(), 6, "A"))
        );
        assert_eq!(layout.field_definition("x"), None);
        assert_eq!(layout.field_definition("nope"), None);
    }
}
