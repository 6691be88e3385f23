//! Codec defaults and layout construction options.

use serde::Deserialize;

use crate::codec::Endianness;
use crate::ebcdic::{CodePage, CP037, CP500};
use crate::error::{DatamapError, ErrorKind, Result};

/// Byte order of binary fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Byte order of the host.
    #[default]
    Native,
    /// Big endian.
    Network,
}

impl ByteOrder {
    pub fn endianness(self) -> Endianness {
        match self {
            ByteOrder::Network => Endianness::Big,
            ByteOrder::Native if cfg!(target_endian = "big") => Endianness::Big,
            ByteOrder::Native => Endianness::Little,
        }
    }

    pub fn from_name(name: &str) -> Option<ByteOrder> {
        match name.to_ascii_lowercase().as_str() {
            "native" | "=" | "@" => Some(ByteOrder::Native),
            "network" | "big" | "!" | ">" => Some(ByteOrder::Network),
            _ => None,
        }
    }
}

/// Text encoding of a layout's `String` and `Char` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum TextEncoding {
    #[default]
    Latin1,
    Ascii,
    Utf8,
    Cp037,
    Cp500,
}

impl TextEncoding {
    pub fn from_name(name: &str) -> Option<TextEncoding> {
        let n = name.to_ascii_lowercase().replace('-', "_");
        match n.as_str() {
            "latin_1" | "latin1" | "iso_8859_1" | "iso8859_1" | "l1" => Some(TextEncoding::Latin1),
            "ascii" | "us_ascii" => Some(TextEncoding::Ascii),
            "utf_8" | "utf8" => Some(TextEncoding::Utf8),
            "cp037" | "ibm037" | "ibm_037" => Some(TextEncoding::Cp037),
            "cp500" | "ibm500" | "ibm_500" => Some(TextEncoding::Cp500),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Latin1 => "latin_1",
            TextEncoding::Ascii => "ascii",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Cp037 => "cp037",
            TextEncoding::Cp500 => "cp500",
        }
    }

    pub fn code_page(self) -> Option<&'static CodePage> {
        match self {
            TextEncoding::Cp037 => Some(&CP037),
            TextEncoding::Cp500 => Some(&CP500),
            _ => None,
        }
    }

    pub fn is_ebcdic(self) -> bool {
        self.code_page().is_some()
    }

    /// The encoded blank used for right padding.
    pub fn space(self) -> u8 {
        if self.is_ebcdic() {
            0x40
        } else {
            b' '
        }
    }

    /// Encode text; the first character without a mapping is returned as error.
    pub fn encode(self, s: &str) -> std::result::Result<Vec<u8>, char> {
        match self {
            TextEncoding::Utf8 => Ok(s.as_bytes().to_vec()),
            TextEncoding::Latin1 => s
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| c))
                .collect(),
            TextEncoding::Ascii => s
                .chars()
                .map(|c| if c.is_ascii() { Ok(c as u8) } else { Err(c) })
                .collect(),
            TextEncoding::Cp037 => CP037.encode(s),
            TextEncoding::Cp500 => CP500.encode(s),
        }
    }

    /// Decode text; bytes without a mapping become U+FFFD.
    pub fn decode(self, b: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(b).into_owned(),
            TextEncoding::Latin1 => b.iter().map(|&x| char::from(x)).collect(),
            TextEncoding::Ascii => b
                .iter()
                .map(|&x| if x.is_ascii() { char::from(x) } else { '\u{FFFD}' })
                .collect(),
            TextEncoding::Cp037 => CP037.decode(b),
            TextEncoding::Cp500 => CP500.decode(b),
        }
    }
}

impl TryFrom<String> for TextEncoding {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        TextEncoding::from_name(&s).ok_or_else(|| format!("unknown encoding {s}"))
    }
}

/// Defaults a layout falls back to when it does not set byte order or
/// EBCDIC itself. Nested layouts receive their parent's defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecDefaults {
    pub byte_order: ByteOrder,
    pub ebcdic: bool,
}

impl CodecDefaults {
    pub fn network() -> Self {
        CodecDefaults {
            byte_order: ByteOrder::Network,
            ebcdic: false,
        }
    }

    pub fn mainframe() -> Self {
        CodecDefaults {
            byte_order: ByteOrder::Network,
            ebcdic: true,
        }
    }
}

/// Construction options of a [`Layout`](crate::Layout).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutOptions {
    /// Byte order; `None` falls back to the parent layout, then to `defaults`.
    #[serde(alias = "byteOrder", alias = "byteorder")]
    pub byte_order: Option<ByteOrder>,
    /// Text is EBCDIC; implied by an EBCDIC `encoding`.
    pub ebcdic: Option<bool>,
    pub encoding: Option<TextEncoding>,
    /// Default occurrence count when the layout is used as a periodic group.
    pub occurs: Option<usize>,
    /// Start offset used by [`Layout::bind_default`](crate::Layout::bind_default).
    pub offset: usize,
    /// Force `prepare()` to re-walk the fields.
    pub varies: bool,
    /// Minimum record size.
    pub dmlen: Option<usize>,
    pub defaults: CodecDefaults,
}

impl LayoutOptions {
    /// Parse options from a JSON object. Unknown keys are rejected.
    pub fn from_json(json: &str) -> Result<LayoutOptions> {
        serde_json::from_str(json).map_err(|e| {
            let msg = e.to_string();
            let kind = if msg.starts_with("unknown field") {
                ErrorKind::UnknownOption(msg)
            } else {
                ErrorKind::InvalidOption(msg)
            };
            DatamapError::new("options", kind)
        })
    }

    /// Set one option by keyword.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || {
            DatamapError::new(
                "options",
                ErrorKind::InvalidOption(format!("{key}={value}")),
            )
        };
        match key {
            "byteOrder" | "byteorder" | "byte_order" => {
                self.byte_order = Some(ByteOrder::from_name(value).ok_or_else(invalid)?);
            }
            "ebcdic" => self.ebcdic = Some(parse_flag(value).ok_or_else(invalid)?),
            "encoding" => {
                self.encoding = Some(TextEncoding::from_name(value).ok_or_else(invalid)?);
            }
            "occurs" => self.occurs = Some(value.parse().map_err(|_| invalid())?),
            "offset" => self.offset = value.parse().map_err(|_| invalid())?,
            "varies" => self.varies = parse_flag(value).ok_or_else(invalid)?,
            "dmlen" => self.dmlen = Some(value.parse().map_err(|_| invalid())?),
            _ => {
                return Err(DatamapError::new(
                    "options",
                    ErrorKind::UnknownOption(key.to_string()),
                ))
            }
        }
        Ok(())
    }

    pub fn byte_order(mut self, bo: ByteOrder) -> Self {
        self.byte_order = Some(bo);
        self
    }

    pub fn ebcdic(mut self, on: bool) -> Self {
        self.ebcdic = Some(on);
        self
    }

    pub fn encoding(mut self, enc: TextEncoding) -> Self {
        self.encoding = Some(enc);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn occurs(mut self, n: usize) -> Self {
        self.occurs = Some(n);
        self
    }

    pub fn varies(mut self, on: bool) -> Self {
        self.varies = on;
        self
    }

    pub fn dmlen(mut self, n: usize) -> Self {
        self.dmlen = Some(n);
        self
    }

    pub fn defaults(mut self, defaults: CodecDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
