use std::{
    fmt,
    fmt::{Debug, Display},
};

/// Wraps credentials (API keys, OAuth client secrets, webhook signing keys) so that they never end up in logs.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + Default + PartialEq> Secret<T> {
    /// True if the secret holds something other than the default (empty) value.
    pub fn is_set(&self) -> bool {
        self.value != T::default()
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod test {
    use super::Secret;

    #[test]
    fn secrets_are_masked() {
        let secret = Secret::new("client-secret".to_string());
        assert_eq!(format!("{secret} {secret:?}"), "**** ****");
        assert_eq!(secret.reveal(), "client-secret");
        assert!(secret.is_set());
        assert!(!Secret::<String>::default().is_set());
    }
}
