//! Domain records for users, parcels and delivery proofs, together with the
//! write payloads accepted over HTTP.
//!
//! Payloads carry every writable field as a [`Field`] so one type serves
//! creation, full replacement (PUT) and partial update (PATCH), and an explicit
//! JSON `null` stays distinguishable from an omitted key. Validation is
//! explicit: `validate` collects [`FieldErrors`], `into_new`/`apply` only run
//! once validation passed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::errors::FieldErrors;

const REQUIRED_BLANK: &str = "This field may not be blank.";
const REQUIRED_MISSING: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";

/// Whether a write must supply every required field (POST, PUT) or only the
/// fields it wants to change (PATCH).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Full,
    Partial,
}

impl WriteMode {
    fn requires_all(self) -> bool { matches!(self, WriteMode::Full) }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    Courier,
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Courier => "courier",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(UserRole::Customer),
            "courier" => Some(UserRole::Courier),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParcelStatus {
    #[default]
    Pending,
    InTransit,
    Delivered,
    Cancelled,
}

impl ParcelStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ParcelStatus::Pending => "pending",
            ParcelStatus::InTransit => "in_transit",
            ParcelStatus::Delivered => "delivered",
            ParcelStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ParcelStatus::Pending),
            "in_transit" => Some(ParcelStatus::InTransit),
            "delivered" => Some(ParcelStatus::Delivered),
            "cancelled" => Some(ParcelStatus::Cancelled),
            _ => None,
        }
    }
}

/// A person known to the delivery service: sender, courier or staff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// Letters, digits and `@ . + - _`, at most 150 characters.
    pub fn validate_username(username: &str) -> Result<(), &'static str> {
        if username.trim().is_empty() {
            return Err(REQUIRED_BLANK);
        }
        if username.chars().count() > 150 {
            return Err("Ensure this field has no more than 150 characters.");
        }
        let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
        if username.chars().all(allowed) {
            Ok(())
        } else {
            Err("Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.")
        }
    }

    pub fn validate_email(email: &str) -> Result<(), &'static str> {
        if email.trim().is_empty() {
            return Err(REQUIRED_BLANK);
        }
        // Shape check only, not RFC 5322.
        let has_at = email.contains('@');
        let has_dot = email.contains('.');
        let len = email.chars().count();
        if has_at && has_dot && (3..=254).contains(&len) {
            Ok(())
        } else {
            Err("Enter a valid email address.")
        }
    }
}

/// One writable payload field: `None` when the key was omitted, `Some(None)`
/// for an explicit `null`, `Some(Some(v))` for a value.
pub type Field<T> = Option<Option<T>>;

/// Keeps `null` apart from a missing key; pair with `#[serde(default)]`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Field<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPayload {
    #[serde(default, deserialize_with = "double_option")]
    pub username: Field<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Field<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub first_name: Field<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub last_name: Field<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Field<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub role: Field<UserRole>,
    #[serde(default, deserialize_with = "double_option")]
    pub is_active: Field<bool>,
}

impl UserPayload {
    pub fn validate(&self, mode: WriteMode) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_present(&mut errors, "username", &self.username, mode);
        check_present(&mut errors, "email", &self.email, mode);
        check_not_null(&mut errors, "first_name", &self.first_name);
        check_not_null(&mut errors, "last_name", &self.last_name);
        check_not_null(&mut errors, "role", &self.role);
        check_not_null(&mut errors, "is_active", &self.is_active);
        if let Some(username) = given(&self.username) {
            if let Err(msg) = User::validate_username(username) {
                errors.add("username", msg);
            }
        }
        if let Some(email) = given(&self.email) {
            if let Err(msg) = User::validate_email(email) {
                errors.add("email", msg);
            }
        }
        check_max_len(&mut errors, "first_name", text(&self.first_name), 150);
        check_max_len(&mut errors, "last_name", text(&self.last_name), 150);
        check_max_len(&mut errors, "phone", text(&self.phone), 32);
        errors
    }

    /// Build a fresh user from a payload that passed `validate(WriteMode::Full)`.
    pub fn into_new(self) -> User {
        let mut user = User {
            id: Uuid::new_v4(),
            username: String::new(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            role: UserRole::default(),
            is_active: true,
            date_joined: now(),
        };
        self.apply(&mut user);
        user
    }

    /// Overwrite the fields present in the payload. `null` clears `phone`.
    pub fn apply(self, user: &mut User) {
        if let Some(Some(v)) = self.username { user.username = v; }
        if let Some(Some(v)) = self.email { user.email = v; }
        if let Some(Some(v)) = self.first_name { user.first_name = v; }
        if let Some(Some(v)) = self.last_name { user.last_name = v; }
        if let Some(v) = self.phone { user.phone = v.and_then(non_empty); }
        if let Some(Some(v)) = self.role { user.role = v; }
        if let Some(Some(v)) = self.is_active { user.is_active = v; }
    }
}

/// A shipment handed over by a sender and optionally assigned to a courier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parcel {
    pub id: Uuid,
    pub tracking_number: String,
    pub sender_id: Uuid,
    pub courier_id: Option<Uuid>,
    pub recipient_name: String,
    pub delivery_address: String,
    pub weight_kg: Option<f64>,
    pub status: ParcelStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Parcel {
    pub fn validate_tracking_number(tracking_number: &str) -> Result<(), &'static str> {
        if tracking_number.trim().is_empty() {
            return Err(REQUIRED_BLANK);
        }
        if tracking_number.len() > 64 {
            return Err("Ensure this field has no more than 64 characters.");
        }
        if tracking_number.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            Ok(())
        } else {
            Err("Tracking numbers may contain only ASCII letters, digits and '-'.")
        }
    }

    pub fn validate_weight(weight_kg: f64) -> Result<(), &'static str> {
        if weight_kg.is_finite() && weight_kg > 0.0 {
            Ok(())
        } else {
            Err("Ensure this value is greater than 0.")
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParcelPayload {
    #[serde(default, deserialize_with = "double_option")]
    pub tracking_number: Field<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub sender_id: Field<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub courier_id: Field<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub recipient_name: Field<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub delivery_address: Field<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub weight_kg: Field<f64>,
    #[serde(default, deserialize_with = "double_option")]
    pub status: Field<ParcelStatus>,
}

impl ParcelPayload {
    pub fn validate(&self, mode: WriteMode) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_present(&mut errors, "tracking_number", &self.tracking_number, mode);
        check_present(&mut errors, "sender_id", &self.sender_id, mode);
        check_present(&mut errors, "recipient_name", &self.recipient_name, mode);
        check_present(&mut errors, "delivery_address", &self.delivery_address, mode);
        check_not_null(&mut errors, "status", &self.status);
        if let Some(tracking_number) = given(&self.tracking_number) {
            if let Err(msg) = Parcel::validate_tracking_number(tracking_number) {
                errors.add("tracking_number", msg);
            }
        }
        check_required_text(&mut errors, "recipient_name", text(&self.recipient_name), 255);
        check_required_text(&mut errors, "delivery_address", text(&self.delivery_address), 1024);
        if let Some(&weight) = given(&self.weight_kg) {
            if let Err(msg) = Parcel::validate_weight(weight) {
                errors.add("weight_kg", msg);
            }
        }
        errors
    }

    /// Build a fresh parcel from a payload that passed `validate(WriteMode::Full)`.
    pub fn into_new(self) -> Parcel {
        let created_at = now();
        let mut parcel = Parcel {
            id: Uuid::new_v4(),
            tracking_number: String::new(),
            sender_id: Uuid::nil(),
            courier_id: None,
            recipient_name: String::new(),
            delivery_address: String::new(),
            weight_kg: None,
            status: ParcelStatus::default(),
            created_at,
            updated_at: created_at,
        };
        self.apply(&mut parcel);
        parcel.updated_at = created_at;
        parcel
    }

    /// `null` unassigns the courier and clears the weight.
    pub fn apply(self, parcel: &mut Parcel) {
        if let Some(Some(v)) = self.tracking_number { parcel.tracking_number = v; }
        if let Some(Some(v)) = self.sender_id { parcel.sender_id = v; }
        if let Some(v) = self.courier_id { parcel.courier_id = v; }
        if let Some(Some(v)) = self.recipient_name { parcel.recipient_name = v; }
        if let Some(Some(v)) = self.delivery_address { parcel.delivery_address = v; }
        if let Some(v) = self.weight_kg { parcel.weight_kg = v; }
        if let Some(Some(v)) = self.status { parcel.status = v; }
        parcel.updated_at = now();
    }
}

/// Evidence that a parcel reached its recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryProof {
    pub id: Uuid,
    pub parcel_id: Uuid,
    pub courier_id: Option<Uuid>,
    pub received_by: String,
    pub signature: Option<String>,
    pub photo_url: Option<String>,
    pub notes: String,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryProofPayload {
    #[serde(default, deserialize_with = "double_option")]
    pub parcel_id: Field<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub courier_id: Field<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub received_by: Field<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub signature: Field<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub photo_url: Field<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Field<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub delivered_at: Field<DateTime<Utc>>,
}

impl DeliveryProofPayload {
    pub fn validate(&self, mode: WriteMode) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_present(&mut errors, "parcel_id", &self.parcel_id, mode);
        check_present(&mut errors, "received_by", &self.received_by, mode);
        check_not_null(&mut errors, "notes", &self.notes);
        check_not_null(&mut errors, "delivered_at", &self.delivered_at);
        check_required_text(&mut errors, "received_by", text(&self.received_by), 255);
        check_max_len(&mut errors, "photo_url", text(&self.photo_url), 2048);
        errors
    }

    /// Build a fresh proof from a payload that passed `validate(WriteMode::Full)`.
    pub fn into_new(self) -> DeliveryProof {
        let mut proof = DeliveryProof {
            id: Uuid::new_v4(),
            parcel_id: Uuid::nil(),
            courier_id: None,
            received_by: String::new(),
            signature: None,
            photo_url: None,
            notes: String::new(),
            delivered_at: now(),
        };
        self.apply(&mut proof);
        proof
    }

    pub fn apply(self, proof: &mut DeliveryProof) {
        if let Some(Some(v)) = self.parcel_id { proof.parcel_id = v; }
        if let Some(v) = self.courier_id { proof.courier_id = v; }
        if let Some(Some(v)) = self.received_by { proof.received_by = v; }
        if let Some(v) = self.signature { proof.signature = v.and_then(non_empty); }
        if let Some(v) = self.photo_url { proof.photo_url = v.and_then(non_empty); }
        if let Some(Some(v)) = self.notes { proof.notes = v; }
        if let Some(Some(v)) = self.delivered_at { proof.delivered_at = v; }
    }
}

/// The value of a field that was sent and not `null`.
fn given<T>(field: &Field<T>) -> Option<&T> { field.as_ref().and_then(Option::as_ref) }

fn text(field: &Field<String>) -> Option<&str> { given(field).map(String::as_str) }

/// Required fields: missing is an error on full writes, `null` always is.
fn check_present<T>(errors: &mut FieldErrors, name: &str, field: &Field<T>, mode: WriteMode) {
    match field {
        None if mode.requires_all() => errors.add(name, REQUIRED_MISSING),
        Some(None) => errors.add(name, NOT_NULL),
        _ => {}
    }
}

fn check_not_null<T>(errors: &mut FieldErrors, name: &str, field: &Field<T>) {
    if matches!(field, Some(None)) {
        errors.add(name, NOT_NULL);
    }
}

fn check_max_len(errors: &mut FieldErrors, field: &str, value: Option<&str>, max: usize) {
    if let Some(v) = value {
        if v.chars().count() > max {
            errors.add(field, format!("Ensure this field has no more than {max} characters."));
        }
    }
}

fn check_required_text(errors: &mut FieldErrors, field: &str, value: Option<&str>, max: usize) {
    if let Some(v) = value {
        if v.trim().is_empty() {
            errors.add(field, REQUIRED_BLANK);
        }
    }
    check_max_len(errors, field, value, max);
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Message used when a write names a record that does not exist.
pub fn missing_reference(id: Uuid) -> String { format!("Invalid pk \"{id}\" - object does not exist.") }

pub fn now() -> DateTime<Utc> { Utc::now() }
