use crate::core::Value;
use std::fmt;
use std::ops::Deref;

/// An ordered primary-key tuple, aligned column-for-column with the key
/// definition of the entity type it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyValues(Vec<Value>);

impl KeyValues {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

impl Deref for KeyValues {
    type Target = [Value];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Value>> for KeyValues {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl From<&[Value]> for KeyValues {
    fn from(values: &[Value]) -> Self {
        Self(values.to_vec())
    }
}

impl FromIterator<Value> for KeyValues {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for KeyValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let key = KeyValues::new(vec![Value::Integer(7), Value::Text("x".into())]);
        assert_eq!(key.to_string(), "(7, 'x')");
        assert_eq!(KeyValues::new(Vec::new()).to_string(), "()");
    }

    #[test]
    fn test_slice_access() {
        let key: KeyValues = vec![Value::Integer(1), Value::Integer(2)].into_iter().collect();
        assert_eq!(key.len(), 2);
        assert_eq!(key[1], Value::Integer(2));
        assert_eq!(key.values(), key.clone().into_inner().as_slice());
    }
}
