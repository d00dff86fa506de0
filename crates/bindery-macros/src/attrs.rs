//! Attribute parsing for `#[bindery(...)]`.

use syn::{Attribute, LitStr};

/// Parsed `#[bindery(...)]` attributes on a type.
#[derive(Debug, Default)]
pub struct TypeAttrs {
    /// Exposed name (default: the Rust struct name).
    pub name: Option<String>,
    /// Implement the by-value casters.
    pub clone: bool,
}

/// Parsed `#[bindery(...)]` attributes on a field.
#[derive(Debug, Default)]
pub struct FieldAttrs {
    /// Expose a getter.
    pub get: bool,
    /// Expose a setter.
    pub set: bool,
    /// Override the property name.
    pub name: Option<String>,
}

impl TypeAttrs {
    /// Parse every `#[bindery(...)]` attribute on the type.
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("bindery") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    if value.value().is_empty() {
                        return Err(meta.error("bindery name cannot be empty"));
                    }
                    result.name = Some(value.value());
                } else if meta.path.is_ident("clone") {
                    result.clone = true;
                } else {
                    return Err(meta.error(format!(
                        "unknown bindery attribute: {}",
                        meta.path.get_ident().map(|i| i.to_string()).unwrap_or_default()
                    )));
                }
                Ok(())
            })?;
        }

        Ok(result)
    }
}

impl FieldAttrs {
    /// Parse every `#[bindery(...)]` attribute on a field.
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("bindery") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("get") {
                    result.get = true;
                } else if meta.path.is_ident("set") {
                    result.set = true;
                } else if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    result.name = Some(value.value());
                } else {
                    return Err(meta.error(format!(
                        "unknown bindery field attribute: {}",
                        meta.path.get_ident().map(|i| i.to_string()).unwrap_or_default()
                    )));
                }
                Ok(())
            })?;
        }

        Ok(result)
    }

    /// Check if the field is exposed at all.
    pub fn is_exposed(&self) -> bool {
        self.get || self.set
    }
}
