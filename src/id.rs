//! Identifier look-up: the immutable mapping from a trice id to its type
//! tag and format template, loaded from a JSON identifier list.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Deserialize;

use crate::Error;

/// Numeric identifier assigned to one distinct trice source site.
pub type TriceId = u32;

/// The information an identifier resolves to: a type tag naming the
/// parameter schema and a printf-style format template.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TriceFmt {
    /// Type tag, e.g. `TRICE8_2`, `TRICE0`, `TRICE_S`.
    #[serde(rename = "Type")]
    pub tag: String,

    /// Format template. Stored with C-style escapes expanded, so a
    /// template line break is a real `'\n'`.
    #[serde(rename = "Strg")]
    pub template: String,
}

/// Identifier table with shared readers and a rare exclusive writer
/// (list reload). Logically immutable between [`Lookup::replace`] calls;
/// every [`Lookup::get`] observes a consistent snapshot.
pub struct Lookup {
    map: RwLock<HashMap<TriceId, TriceFmt>>,
}

impl Lookup {
    /// Parses a JSON identifier list: an object whose keys are decimal
    /// numeric strings and whose values are `{"Type": …, "Strg": …}`.
    ///
    /// Non-numeric keys are ignored; duplicate keys within one document
    /// resolve to the last occurrence. C-style escapes inside `Strg` are
    /// expanded here, once.
    pub fn from_json(list: &[u8]) -> Result<Lookup, Error> {
        let raw: HashMap<String, TriceFmt> = serde_json::from_slice(list)?;
        let map = raw
            .into_iter()
            .filter_map(|(key, fmt)| {
                let id = key.parse::<TriceId>().ok()?;
                Some((
                    id,
                    TriceFmt {
                        tag: fmt.tag,
                        template: unescape(&fmt.template),
                    },
                ))
            })
            .collect();
        Ok(Lookup {
            map: RwLock::new(map),
        })
    }

    /// Resolves `id`, cloning the entry under the read guard.
    pub fn get(&self, id: TriceId) -> Option<TriceFmt> {
        self.read().get(&id).cloned()
    }

    /// Swaps in a freshly loaded table, e.g. after the identifier list
    /// file changed on disk. Readers block only for the swap itself.
    pub fn replace(&self, other: Lookup) {
        let map = other.map.into_inner().unwrap_or_else(|e| e.into_inner());
        *self
            .map
            .write()
            .unwrap_or_else(|e| e.into_inner()) = map;
    }

    /// Number of identifiers in the table.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TriceId, TriceFmt>> {
        // A poisoned lock only means another reader panicked; the map
        // itself is never left half-written.
        self.map.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Expands the C-style escapes an identifier list uses inside `Strg`:
/// `\n`, `\t`, `\r`, `\"`, `\'`, `\\`, `\0` and `\uXXXX`. Anything else
/// after a backslash is kept verbatim.
fn unescape(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(std::char::from_u32)
                {
                    Some(u) => out.push(u),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_and_get() {
        let lut = Lookup::from_json(
            br#"{
                "65409": { "Type": "TRICE8_1", "Strg": "tst:TRICE8_1 %d\\n" },
                "47663": { "Type": "TRICE16_2", "Strg": "MSG: depth = %d, select = %d\\n" }
            }"#,
        )
        .unwrap();
        assert_eq!(lut.len(), 2);
        let fmt = lut.get(65409).unwrap();
        assert_eq!(fmt.tag, "TRICE8_1");
        assert_eq!(fmt.template, "tst:TRICE8_1 %d\n");
        assert!(lut.get(1).is_none());
    }

    #[test]
    fn non_numeric_keys_are_ignored() {
        let lut = Lookup::from_json(
            br#"{
                "comment": { "Type": "TRICE0", "Strg": "x" },
                "7": { "Type": "TRICE0", "Strg": "y" }
            }"#,
        )
        .unwrap();
        assert_eq!(lut.len(), 1);
        assert!(lut.get(7).is_some());
    }

    #[test]
    fn duplicate_keys_resolve_to_last() {
        let lut = Lookup::from_json(
            br#"{
                "7": { "Type": "TRICE0", "Strg": "first" },
                "7": { "Type": "TRICE0", "Strg": "second" }
            }"#,
        )
        .unwrap();
        assert_eq!(lut.get(7).unwrap().template, "second");
    }

    #[test]
    fn replace_swaps_the_table() {
        let lut = Lookup::from_json(br#"{ "1": { "Type": "TRICE0", "Strg": "a" } }"#).unwrap();
        lut.replace(Lookup::from_json(br#"{ "2": { "Type": "TRICE0", "Strg": "b" } }"#).unwrap());
        assert!(lut.get(1).is_none());
        assert_eq!(lut.get(2).unwrap().template, "b");
    }

    #[test]
    fn escapes_are_expanded_once() {
        assert_eq!(unescape(r"a\nb\tc"), "a\nb\tc");
        assert_eq!(unescape(r"100%\n"), "100%\n");
        assert_eq!(unescape(r"A\\n"), "A\\n");
        assert_eq!(unescape(r"dangling\"), "dangling\\");
        assert_eq!(unescape(r"\q"), "\\q");
    }

    #[test]
    fn bad_json_is_a_list_error() {
        assert!(Lookup::from_json(b"{ not json").is_err());
    }

    #[test]
    fn empty_object_is_fine() {
        let lut = Lookup::from_json(b"{}").unwrap();
        assert!(lut.is_empty());
    }
}
