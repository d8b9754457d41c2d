//! Field declarations and value codecs.
//!
//! A [`FieldDescriptor`] declares a named, typed attribute on a mapped class.
//! Descriptors are schema-level: one per declared attribute, shared by every
//! instance of the class. Per-object values never live on the descriptor;
//! they live in that object's [`ObjectState`](crate::state::ObjectState),
//! keyed by the descriptor's [`FieldId`].
//!
//! A [`FieldCodec`] converts between the in-memory value of a field and the
//! BSON representation persisted to the backend. Both directions fail with
//! [`MapError::Validation`] when a value does not satisfy the field's
//! constraints.

use bson::{Bson, oid::ObjectId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{MapError, MapResult};

/// Stable identifier for a declared field, assigned at schema build time in
/// declaration order. Used as the per-object storage key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) u32);

/// The wire-level shape of a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// A backend identity value. Ordinary fields of this kind hold foreign
    /// identities; the class identity itself is declared separately.
    Id,
    /// A UTF-8 string.
    String,
    /// A 64-bit integer. Decodes both `Int32` and `Int64` documents.
    Int,
    /// A fixed-precision decimal, stored as a scaled integer mantissa.
    Decimal {
        /// Maximum number of fractional digits a value may carry.
        precision: u32,
    },
    /// A UTC timestamp, truncated to the backend's millisecond precision.
    DateTime,
    /// A string constrained to a plausible email shape.
    Email,
}

/// Declaration-time description of a field, consumed by
/// [`SchemaBuilder::field`](crate::schema::SchemaBuilder::field).
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) default: Option<Bson>,
    pub(crate) required: bool,
    pub(crate) unique: bool,
}

impl FieldSpec {
    /// Declares a field with the given attribute name and wire shape.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            required: false,
            unique: false,
        }
    }

    /// Sets the default returned when an object carries no value for this
    /// field. The default is supplied in encoded (wire) form.
    pub fn default_raw(mut self, raw: Bson) -> Self {
        self.default = Some(raw);
        self
    }

    /// Requires a value to be present when the object is written out.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field as unique. This is declarative metadata for backend
    /// adapters; the mapping engine itself does not enforce it.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A named, typed attribute on a mapped class.
///
/// One descriptor exists per declared attribute per class, owned by the
/// class's [`Schema`](crate::schema::Schema) and shared across all instances.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub(crate) id: FieldId,
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) default: Option<Bson>,
    pub(crate) required: bool,
    pub(crate) unique: bool,
}

impl FieldDescriptor {
    /// The per-object storage key for this field.
    pub fn id(&self) -> FieldId {
        self.id
    }

    /// The attribute name, which doubles as the document key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wire-level shape of this field.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// The encoded default value, if one was declared.
    pub fn default_raw(&self) -> Option<&Bson> {
        self.default.as_ref()
    }

    /// Whether a value must be present when the object is written out.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether the field was declared unique.
    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

/// Converts between in-memory values and their wire representation.
///
/// `encode` produces the BSON form persisted to the backend; `decode` turns a
/// stored value back into the in-memory form. Both reject values that do not
/// satisfy the field's constraints with [`MapError::Validation`].
pub trait FieldCodec {
    /// The in-memory value type this codec handles.
    type Value;

    /// Encodes a value into its wire representation.
    fn encode(&self, value: &Self::Value) -> MapResult<Bson>;

    /// Decodes a wire value back into its in-memory representation.
    fn decode(&self, raw: &Bson) -> MapResult<Self::Value>;
}

/// Codec for backend identity values.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdCodec;

impl FieldCodec for IdCodec {
    type Value = ObjectId;

    fn encode(&self, value: &Self::Value) -> MapResult<Bson> {
        Ok(Bson::ObjectId(*value))
    }

    fn decode(&self, raw: &Bson) -> MapResult<Self::Value> {
        match raw {
            Bson::ObjectId(id) => Ok(*id),
            other => Err(MapError::Validation(format!(
                "expected an object id, got {other}"
            ))),
        }
    }
}

/// Codec for UTF-8 string fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringCodec;

impl FieldCodec for StringCodec {
    type Value = String;

    fn encode(&self, value: &Self::Value) -> MapResult<Bson> {
        Ok(Bson::String(value.clone()))
    }

    fn decode(&self, raw: &Bson) -> MapResult<Self::Value> {
        match raw {
            Bson::String(value) => Ok(value.clone()),
            other => Err(MapError::Validation(format!(
                "expected a string, got {other}"
            ))),
        }
    }
}

/// Codec for 64-bit integer fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntCodec;

impl FieldCodec for IntCodec {
    type Value = i64;

    fn encode(&self, value: &Self::Value) -> MapResult<Bson> {
        Ok(Bson::Int64(*value))
    }

    fn decode(&self, raw: &Bson) -> MapResult<Self::Value> {
        match raw {
            Bson::Int32(value) => Ok(i64::from(*value)),
            Bson::Int64(value) => Ok(*value),
            other => Err(MapError::Validation(format!(
                "value {other} is not coercible to an integer"
            ))),
        }
    }
}

/// Codec for fixed-precision decimal fields.
///
/// Values are stored as scaled integer mantissas: with precision 2, `12.45`
/// is persisted as `1245`. A value carrying more fractional digits than the
/// configured precision is rejected rather than rounded.
#[derive(Clone, Copy, Debug)]
pub struct DecimalCodec {
    /// Maximum number of fractional digits a value may carry.
    pub precision: u32,
}

impl FieldCodec for DecimalCodec {
    type Value = Decimal;

    fn encode(&self, value: &Self::Value) -> MapResult<Bson> {
        if value.scale() > self.precision {
            return Err(MapError::Validation(format!(
                "decimal {value} exceeds the configured precision of {} fractional digits",
                self.precision
            )));
        }
        let factor = 10i128
            .checked_pow(self.precision - value.scale())
            .ok_or_else(|| MapError::Validation(format!("decimal {value} is not representable")))?;
        let scaled = value
            .mantissa()
            .checked_mul(factor)
            .and_then(|scaled| i64::try_from(scaled).ok())
            .ok_or_else(|| MapError::Validation(format!("decimal {value} is not representable")))?;
        Ok(Bson::Int64(scaled))
    }

    fn decode(&self, raw: &Bson) -> MapResult<Self::Value> {
        match raw {
            Bson::Int32(value) => Ok(Decimal::new(i64::from(*value), self.precision)),
            Bson::Int64(value) => Ok(Decimal::new(*value, self.precision)),
            other => Err(MapError::Validation(format!(
                "expected a scaled decimal mantissa, got {other}"
            ))),
        }
    }
}

/// Codec for UTC timestamps.
///
/// The wire representation carries millisecond precision; finer-grained
/// input is truncated on encode.
#[derive(Clone, Copy, Debug, Default)]
pub struct DateTimeCodec;

impl FieldCodec for DateTimeCodec {
    type Value = DateTime<Utc>;

    fn encode(&self, value: &Self::Value) -> MapResult<Bson> {
        Ok(Bson::DateTime(bson::DateTime::from_chrono(*value)))
    }

    fn decode(&self, raw: &Bson) -> MapResult<Self::Value> {
        match raw {
            Bson::DateTime(value) => Ok(value.to_chrono()),
            other => Err(MapError::Validation(format!(
                "expected a datetime, got {other}"
            ))),
        }
    }
}

/// Codec for email-address fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmailCodec;

impl FieldCodec for EmailCodec {
    type Value = String;

    fn encode(&self, value: &Self::Value) -> MapResult<Bson> {
        check_email(value)?;
        Ok(Bson::String(value.clone()))
    }

    fn decode(&self, raw: &Bson) -> MapResult<Self::Value> {
        match raw {
            Bson::String(value) => {
                check_email(value)?;
                Ok(value.clone())
            }
            other => Err(MapError::Validation(format!(
                "expected an email address, got {other}"
            ))),
        }
    }
}

fn check_email(address: &str) -> MapResult<()> {
    let mut parts = address.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let ok = match parts.next() {
        Some(domain) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.contains('@')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !address.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if ok {
        Ok(())
    } else {
        Err(MapError::Validation(format!(
            "malformed email address: {address:?}"
        )))
    }
}
