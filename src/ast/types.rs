use serde::{Deserialize, Serialize};

/// Static type tag carried by every expression node.
///
/// `Object` is the catch-all: anything whose type is unknown or mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JxType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Object,
}

impl JxType {
    pub fn name(self) -> &'static str {
        match self {
            JxType::Null => "null",
            JxType::Boolean => "boolean",
            JxType::Integer => "integer",
            JxType::Number => "number",
            JxType::String => "string",
            JxType::Object => "object",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, JxType::Integer | JxType::Number)
    }

    /// Least upper bound of two types.
    ///
    /// `null` is absorbed, `integer` widens to `number`, anything else
    /// that disagrees becomes `object`.
    pub fn merge(self, other: JxType) -> JxType {
        use JxType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Null, t) | (t, Null) => t,
            (Integer, Number) | (Number, Integer) => Number,
            _ => Object,
        }
    }

    /// Merge a sequence of types; an empty sequence is `null`.
    pub fn merge_all<I: IntoIterator<Item = JxType>>(types: I) -> JxType {
        types.into_iter().fold(JxType::Null, JxType::merge)
    }

    /// Physical storage column family used by the multi-typed-column layout.
    pub fn storage(self) -> Option<StorageType> {
        match self {
            JxType::Null => None,
            JxType::Boolean => Some(StorageType::Boolean),
            JxType::Integer | JxType::Number => Some(StorageType::Number),
            JxType::String => Some(StorageType::String),
            JxType::Object => Some(StorageType::Json),
        }
    }
}

impl std::fmt::Display for JxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One physical column per JSON type per logical field; at most one is
/// populated per row.
///
/// The ordering (`b`, `n`, `s`, `j`) is also the order in which backends
/// iterate typed fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageType {
    Boolean,
    Number,
    String,
    Json,
}

impl StorageType {
    pub const ALL: [StorageType; 4] = [
        StorageType::Boolean,
        StorageType::Number,
        StorageType::String,
        StorageType::Json,
    ];

    /// Single-letter key used for typed SQL fragments.
    pub fn letter(self) -> char {
        match self {
            StorageType::Boolean => 'b',
            StorageType::Number => 'n',
            StorageType::String => 's',
            StorageType::Json => 'j',
        }
    }

    pub fn from_letter(c: char) -> Option<StorageType> {
        match c {
            'b' => Some(StorageType::Boolean),
            'n' => Some(StorageType::Number),
            's' => Some(StorageType::String),
            'j' => Some(StorageType::Json),
            _ => None,
        }
    }

    pub fn jx_type(self) -> JxType {
        match self {
            StorageType::Boolean => JxType::Boolean,
            StorageType::Number => JxType::Number,
            StorageType::String => JxType::String,
            StorageType::Json => JxType::Object,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        assert_eq!(JxType::Integer.merge(JxType::Number), JxType::Number);
        assert_eq!(JxType::Null.merge(JxType::String), JxType::String);
        assert_eq!(JxType::String.merge(JxType::Boolean), JxType::Object);
        assert_eq!(JxType::merge_all([]), JxType::Null);
    }

    #[test]
    fn test_storage_letters() {
        assert_eq!(JxType::Integer.storage(), Some(StorageType::Number));
        assert_eq!(JxType::Null.storage(), None);
        for t in StorageType::ALL {
            assert_eq!(StorageType::from_letter(t.letter()), Some(t));
        }
    }
}
