//! STRG string tables.
//!
//! Only the subset needed for naming levels and areas is handled: the
//! version 0 layout with UTF-16BE strings.

use serde::{Deserialize, Serialize};

use chozo_common::{BinaryWriter, EntryReadStream, FourCC, ReadStream, SeekOrigin};

use crate::{Error, Result};

const STRG_MAGIC: u32 = 0x8765_4321;

/// One language's strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrgLanguage {
    pub lang: FourCC,
    pub strings: Vec<String>,
}

/// A decoded string table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strg {
    pub languages: Vec<StrgLanguage>,
}

impl Strg {
    /// Decode a STRG payload.
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut r = EntryReadStream::from_vec(data.to_vec())?;
        let magic = r.read_u32()?;
        if magic != STRG_MAGIC {
            return Err(Error::InvalidMagic {
                what: "STRG",
                expected: STRG_MAGIC,
                actual: magic,
            });
        }
        let version = r.read_u32()?;
        if version != 0 {
            return Err(Error::UnsupportedVersion {
                what: "STRG",
                version,
            });
        }

        let lang_count = r.read_u32()?;
        let string_count = r.read_u32()?;
        let mut table = Vec::with_capacity(lang_count as usize);
        for _ in 0..lang_count {
            table.push((r.read_fourcc()?, r.read_u32()?));
        }
        let tables_start = r.position();

        let mut languages = Vec::with_capacity(table.len());
        for (lang, offset) in table {
            r.seek((tables_start + offset as u64) as i64, SeekOrigin::Begin)?;
            let _table_size = r.read_u32()?;
            let strings_start = r.position();
            let mut offsets = Vec::with_capacity(string_count as usize);
            for _ in 0..string_count {
                offsets.push(r.read_u32()?);
            }
            let mut strings = Vec::with_capacity(offsets.len());
            for off in offsets {
                r.seek((strings_start + off as u64) as i64, SeekOrigin::Begin)?;
                strings.push(read_wstring(&mut r)?);
            }
            languages.push(StrgLanguage { lang, strings });
        }

        Ok(Self { languages })
    }

    /// A single-string English table, as used for world and area names.
    pub fn single(text: impl Into<String>) -> Self {
        Self {
            languages: vec![StrgLanguage {
                lang: FourCC::new(b"ENGL"),
                strings: vec![text.into()],
            }],
        }
    }

    /// The first English string, trimmed.
    pub fn first_english(&self) -> Option<String> {
        self.languages
            .iter()
            .find(|l| l.lang == FourCC::new(b"ENGL"))
            .and_then(|l| l.strings.first())
            .map(|s| s.trim().to_string())
    }

    /// Number of strings per language (the longest language wins).
    pub fn string_count(&self) -> usize {
        self.languages.iter().map(|l| l.strings.len()).max().unwrap_or(0)
    }

    /// Encode in the version 0 layout. Languages with fewer strings are
    /// padded with empty strings.
    pub fn write(&self) -> Vec<u8> {
        let count = self.string_count();
        let tables: Vec<Vec<u8>> = self
            .languages
            .iter()
            .map(|lang| {
                let mut offsets = BinaryWriter::new();
                let mut body = BinaryWriter::new();
                for i in 0..count {
                    offsets.write_u32((count * 4 + body.len()) as u32);
                    let text = lang.strings.get(i).map(String::as_str).unwrap_or("");
                    for unit in text.encode_utf16() {
                        body.write_u16(unit);
                    }
                    body.write_u16(0);
                }
                let mut table = BinaryWriter::new();
                table.write_u32((offsets.len() + body.len()) as u32);
                table.write_bytes(offsets.as_slice());
                table.write_bytes(body.as_slice());
                table.into_inner()
            })
            .collect();

        let mut w = BinaryWriter::new();
        w.write_u32(STRG_MAGIC);
        w.write_u32(0);
        w.write_u32(self.languages.len() as u32);
        w.write_u32(count as u32);
        let mut offset = 0u32;
        for (lang, table) in self.languages.iter().zip(&tables) {
            w.write_fourcc(lang.lang);
            w.write_u32(offset);
            offset += table.len() as u32;
        }
        for table in tables {
            w.write_bytes(&table);
        }
        w.into_inner()
    }
}

fn read_wstring<R: ReadStream>(r: &mut R) -> Result<String> {
    let mut units = Vec::new();
    loop {
        match r.read_u16()? {
            0 => break,
            u => units.push(u),
        }
    }
    String::from_utf16(&units).map_err(|_| Error::Common(chozo_common::Error::Utf16))
}

/// Read the display name from a STRG payload.
pub fn read_strg_name(data: &[u8]) -> Result<Option<String>> {
    Ok(Strg::read(data)?.first_english())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_name() {
        let strg = Strg {
            languages: vec![
                StrgLanguage {
                    lang: FourCC::new(b"FREN"),
                    strings: vec!["Forêt".to_string()],
                },
                StrgLanguage {
                    lang: FourCC::new(b"ENGL"),
                    strings: vec!["  Chozo Ruins ".to_string(), "second".to_string()],
                },
            ],
        };
        let bytes = strg.write();
        let back = Strg::read(&bytes).unwrap();
        assert_eq!(back.languages[0].strings, vec!["Forêt".to_string(), String::new()]);
        assert_eq!(back.first_english().as_deref(), Some("Chozo Ruins"));
        assert_eq!(read_strg_name(&bytes).unwrap().as_deref(), Some("Chozo Ruins"));
    }

    #[test]
    fn test_bad_magic() {
        let err = Strg::read(&[0u8; 16]).unwrap_err();
        assert_eq!(err.kind(), chozo_common::ErrorKind::Corrupt);
    }
}
