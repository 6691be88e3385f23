//! # datamap: declarative binary record layouts
//!
//! Describe a fixed or variable binary record once as a [`Layout`] of named
//! fields, then read and write typed [`Value`]s through a [`Record`] bound to
//! any byte buffer at any offset. The layout never owns the buffer.
//!
//! ## Field types
//!
//! - Text: `String` (latin-1, ASCII or an EBCDIC code page), `Utf8`, `Utf16`, `Char`
//! - Binary integers `Int1`..`Uint8`, `Float`, `Double` in native or network byte order
//! - Decimal: `Packed` (BCD with sign nibble) and `Unpacked` (zoned)
//! - `Bytes`, and periodic groups of a nested layout
//!
//! ## Variable layouts
//!
//! Fields can carry a 1, 2 or 4 byte length prefix, repeat a fixed or
//! buffer-derived number of times, or be repositioned. After binding such a
//! layout, [`Record::prepare`] walks the buffer and fixes positions, sizes and
//! occurrence counts.
//!
//! ## Example
//!
//! ```
//! use datamap::{field, ByteOrder, Layout, LayoutOptions, Value};
//!
//! let mut layout = Layout::with_options(
//!     "order",
//!     [
//!         field::string("id", 6),
//!         field::packed("amount", 4),
//!         field::uint2("lines").opt(datamap::FieldOpts::HEX),
//!     ],
//!     LayoutOptions::default().byte_order(ByteOrder::Network),
//! )?;
//! let mut buf = vec![0u8; layout.size()];
//! let mut rec = layout.bind(&mut buf, 0);
//! rec.set("id", "A-17")?;
//! rec.set("amount", -12345)?;
//! rec.set("lines", 3)?;
//! assert_eq!(rec.get("amount")?, Value::Int(-12345));
//! assert_eq!(&buf[6..10], &[0x00, 0x12, 0x34, 0x5D]);
//! # Ok::<(), datamap::DatamapError>(())
//! ```

pub mod codec;
pub mod config;
pub mod dtconv;
pub mod dump;
pub mod ebcdic;
pub mod error;
pub mod fbuf;
pub mod field;
pub mod layout;
pub mod record;
pub mod repeat;
pub mod value;

pub use codec::{fpack, funpack, Codec, Endianness, NumFormat};
pub use config::{ByteOrder, CodecDefaults, LayoutOptions, TextEncoding};
pub use error::{DatamapError, ErrorKind, Result};
pub use field::{DtKind, FieldOpts, FieldSpec, FieldType, Occurs};
pub use layout::{Field, Layout, OccursContext};
pub use record::Record;
pub use repeat::Repeated;
pub use value::Value;
