//! Store model types for tablegate.
//!
//! These are the wire shapes exchanged with a partition/sort-key document
//! store: attribute values, items, table metadata, and the request/response
//! structs of the operations the access layer issues. The store's JSON
//! protocol makes serde derives trivial, so everything is hand-written.
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod output;
pub mod types;

pub use attribute_value::AttributeValue;
pub use error::{StoreError, StoreErrorCode};
pub use types::{Item, Key};

/// Build an [`Item`] from `name => value` pairs.
///
/// Values go through `AttributeValue::from`, so literals work directly.
///
/// # Examples
///
/// ```
/// use tablegate_model::{AttributeValue, item};
///
/// let entity = item! { "id" => 1, "name" => "Ada", "active" => true };
/// assert_eq!(entity.get("name"), Some(&AttributeValue::S("Ada".to_owned())));
/// assert_eq!(entity.len(), 3);
/// ```
#[macro_export]
macro_rules! item {
    () => {
        $crate::types::Item::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut item = $crate::types::Item::new();
        $(
            item.insert(::std::string::String::from($name), $crate::AttributeValue::from($value));
        )+
        item
    }};
}
