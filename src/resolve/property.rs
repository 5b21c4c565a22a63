//! Logical-property resolution over raw property entries.
//!
//! Every lookup walks an ordered list of candidate identifiers and stops at
//! the first one that yields a usable value. Per identifier, the reader's
//! native typed accessor is asked first; otherwise the generic entry list is
//! scanned and the raw bytes decoded according to the entry's value type.
//! Nothing here returns an error: an unresolvable property is `None`.

use std::cell::OnceCell;

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, trace};

use crate::archive::{ArchiveMessage, PropertySource};
use crate::model::property::{LogicalProperty, PropertyEntry, PropertyTag, ValueType};
use crate::parser::encoding;

/// Values starting with this prefix are reader placeholders, not real names.
pub const SENTINEL_PREFIX: &str = "___";

/// Evaluate `attempt` over `strategies` in order and return the first `Some`.
///
/// All fallback chains in the crate (identifier lists, address recovery
/// steps) go through this, so each chain is a plain list of strategies.
pub fn first_success<S, T>(
    strategies: impl IntoIterator<Item = S>,
    attempt: impl FnMut(S) -> Option<T>,
) -> Option<T> {
    strategies.into_iter().find_map(attempt)
}

/// Resolve a logical property to text.
pub fn get_property<S: PropertySource + ?Sized>(
    source: &S,
    property: LogicalProperty,
) -> Option<String> {
    get_string(source, property.tags(), |_| true)
}

/// Resolve the first of `tags` that yields a non-blank value accepted by
/// `accept`. The returned text is trimmed.
pub fn get_string<S: PropertySource + ?Sized>(
    source: &S,
    tags: &[PropertyTag],
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    let entries = OnceCell::new();
    first_success(tags.iter().copied(), |tag| {
        string_for_tag(source, tag, &entries).filter(|value| accept(value))
    })
}

/// Resolve a logical property to an unsigned 32-bit integer.
///
/// `PT_LONG` entries are read little-endian; string-typed entries written by
/// older producers are parsed as decimal.
pub fn get_integer<S: PropertySource + ?Sized>(
    source: &S,
    property: LogicalProperty,
) -> Option<u32> {
    let entries = OnceCell::new();
    first_success(property.tags().iter().copied(), |tag| {
        match source.native_integer(tag) {
            // Stored as a 32-bit field; wider native values are truncated.
            Ok(Some(value)) => return Some(value as u32),
            Ok(None) => {}
            Err(e) => trace!(tag = format_args!("{tag:#06x}"), error = %e, "Native integer unavailable"),
        }
        load_entries(source, &entries)
            .iter()
            .filter(|entry| entry.tag == tag)
            .find_map(integer_value)
    })
}

/// Message class from the reader's accessor, else from the property entries.
pub fn message_class<M: ArchiveMessage + ?Sized>(message: &M) -> Option<String> {
    match message.message_class() {
        Ok(Some(class)) if !class.trim().is_empty() => return Some(class.trim().to_string()),
        Ok(_) => {}
        Err(e) => debug!(error = %e, "Message class accessor failed"),
    }
    get_property(message, LogicalProperty::MessageClass)
}

/// Whether a value is a reader placeholder rather than a usable string.
pub fn is_sentinel(value: &str) -> bool {
    value.starts_with(SENTINEL_PREFIX)
}

fn string_for_tag<S: PropertySource + ?Sized>(
    source: &S,
    tag: PropertyTag,
    entries: &OnceCell<Vec<PropertyEntry>>,
) -> Option<String> {
    match source.native_string(tag) {
        Ok(Some(value)) if !value.trim().is_empty() => return Some(value.trim().to_string()),
        Ok(_) => {}
        Err(e) => trace!(tag = format_args!("{tag:#06x}"), error = %e, "Native string unavailable"),
    }

    load_entries(source, entries)
        .iter()
        .filter(|entry| entry.tag == tag && !entry.data.is_empty())
        .map(|entry| encoding::decode_property_value(&entry.data, entry.value_type))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn load_entries<'a, S: PropertySource + ?Sized>(
    source: &S,
    entries: &'a OnceCell<Vec<PropertyEntry>>,
) -> &'a [PropertyEntry] {
    entries.get_or_init(|| {
        source.property_entries().unwrap_or_else(|e| {
            debug!(error = %e, "Property entries unavailable");
            Vec::new()
        })
    })
}

fn integer_value(entry: &PropertyEntry) -> Option<u32> {
    match entry.value_type {
        ValueType::Integer32 if entry.data.len() >= 4 => Some(LittleEndian::read_u32(&entry.data)),
        ValueType::Integer32 | ValueType::Binary => None,
        value_type => encoding::decode_property_value(&entry.data, value_type)
            .trim()
            .parse()
            .ok(),
    }
}
