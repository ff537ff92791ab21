//! Domain model for a purchase being entered or edited.
//!
//! The point-of-sale form works with raw text for every numeric field. A
//! [`TransactionDraft`] holds that text, and this module owns the rules that
//! turn it into a stored [`Transaction`] or a [`TransactionPatch`].

use chrono::{DateTime, Utc};
use shared::{GeneralSettings, ItemDetails, ItemType, Karat, PaymentMethod, Transaction};
use std::fmt;

use crate::domain::errors::ValidationError;

/// Item fields as typed into the form, one variant per item category
#[derive(Debug, Clone, PartialEq)]
pub enum ItemDraft {
    Gold {
        weight: String,
        karat: Karat,
    },
    Diamond {
        stone_carat: String,
        stone_clarity: String,
    },
    Watch {
        brand: String,
        model: String,
        serial_number: String,
    },
}

impl ItemDraft {
    pub fn item_type(&self) -> ItemType {
        match self {
            ItemDraft::Gold { .. } => ItemType::Gold,
            ItemDraft::Diamond { .. } => ItemType::Diamond,
            ItemDraft::Watch { .. } => ItemType::Watch,
        }
    }

    /// Coerce the text fields into stored item details.
    /// Malformed or negative measurements become 0.
    pub fn to_details(&self) -> ItemDetails {
        match self {
            ItemDraft::Gold { weight, karat } => ItemDetails::Gold {
                weight: parse_measurement(weight),
                karat: *karat,
            },
            ItemDraft::Diamond {
                stone_carat,
                stone_clarity,
            } => ItemDetails::Diamond {
                stone_carat: parse_measurement(stone_carat),
                stone_clarity: stone_clarity.trim().to_string(),
            },
            ItemDraft::Watch {
                brand,
                model,
                serial_number,
            } => ItemDetails::Watch {
                brand: brand.trim().to_string(),
                model: model.trim().to_string(),
                serial_number: serial_number.trim().to_string(),
            },
        }
    }
}

impl Default for ItemDraft {
    fn default() -> Self {
        ItemDraft::Gold {
            weight: String::new(),
            karat: Karat::default(),
        }
    }
}

/// The purchase form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionDraft {
    pub customer_name: String,
    pub customer_id: String,
    pub phone: String,
    pub item_description: String,
    pub item: ItemDraft,
    pub price: String,
    pub payment_method: PaymentMethod,
    pub check_number: Option<String>,
    /// Location name; empty means the first configured location
    pub store_location: String,
    pub notes: String,
    pub id_image: Option<String>,
    pub signature_image: Option<String>,
}

/// Non-blocking findings on an otherwise valid draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftWarning {
    /// Paid by check but no check number was entered
    MissingCheckNumber,
}

impl fmt::Display for DraftWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftWarning::MissingCheckNumber => write!(f, "Check payment has no check number"),
        }
    }
}

/// A draft that passed the create-time checks, with numbers coerced
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDraft {
    pub item: ItemDetails,
    pub price: f64,
    pub store_location: String,
    pub signature_image: String,
    pub warnings: Vec<DraftWarning>,
}

impl TransactionDraft {
    /// Pre-fill the edit form from a stored purchase
    pub fn from_transaction(tx: &Transaction) -> Self {
        let item = match &tx.item {
            ItemDetails::Gold { weight, karat } => ItemDraft::Gold {
                weight: weight.to_string(),
                karat: *karat,
            },
            ItemDetails::Diamond {
                stone_carat,
                stone_clarity,
            } => ItemDraft::Diamond {
                stone_carat: stone_carat.to_string(),
                stone_clarity: stone_clarity.clone(),
            },
            ItemDetails::Watch {
                brand,
                model,
                serial_number,
            } => ItemDraft::Watch {
                brand: brand.clone(),
                model: model.clone(),
                serial_number: serial_number.clone(),
            },
        };

        Self {
            customer_name: tx.customer_name.clone(),
            customer_id: tx.customer_id.clone(),
            phone: tx.phone.clone(),
            item_description: tx.item_description.clone(),
            item,
            price: tx.price.to_string(),
            payment_method: tx.payment_method,
            check_number: tx.check_number.clone(),
            store_location: tx.store_location.clone(),
            notes: tx.notes.clone(),
            id_image: tx.id_image.clone(),
            signature_image: Some(tx.signature_image.clone()),
        }
    }

    /// Run every check required before a new purchase may be saved.
    ///
    /// Checks run in the order the operator would fix them: signature first,
    /// then required text fields, then price and location.
    pub fn validate_for_create(
        &self,
        settings: &GeneralSettings,
    ) -> Result<ValidatedDraft, ValidationError> {
        let signature_image = match &self.signature_image {
            Some(sig) if !sig.is_empty() => sig.clone(),
            _ => return Err(ValidationError::MissingSignature),
        };

        if self.customer_name.trim().is_empty() {
            return Err(ValidationError::MissingField("Customer name"));
        }
        if self.customer_id.trim().is_empty() {
            return Err(ValidationError::MissingField("Customer ID"));
        }
        if self.item_description.trim().is_empty() {
            return Err(ValidationError::MissingField("Item description"));
        }

        let item = self.to_checked_details()?;
        let price = parse_price(&self.price).ok_or(ValidationError::NonPositivePrice)?;
        let store_location = self.resolve_store_location(settings)?;

        Ok(ValidatedDraft {
            item,
            price,
            store_location,
            signature_image,
            warnings: self.warnings(),
        })
    }

    /// Build the partial write for an edit.
    ///
    /// Edits only enforce the structural item rules and the store location;
    /// the price falls back to 0 when it does not parse, like the
    /// measurements. An empty location keeps the stored one.
    pub fn to_patch(
        &self,
        settings: &GeneralSettings,
        modified_by: &str,
        now: DateTime<Utc>,
    ) -> Result<TransactionPatch, ValidationError> {
        let item = self.to_checked_details()?;
        let store_location = if self.store_location.trim().is_empty() {
            None
        } else {
            Some(self.resolve_store_location(settings)?)
        };

        Ok(TransactionPatch {
            customer_name: self.customer_name.trim().to_string(),
            customer_id: self.customer_id.trim().to_string(),
            phone: self.phone.trim().to_string(),
            item_description: self.item_description.trim().to_string(),
            item,
            price: parse_measurement(&self.price),
            payment_method: self.payment_method,
            check_number: self.normalized_check_number(),
            store_location,
            notes: self.notes.clone(),
            id_image: self.id_image.clone(),
            signature_image: self.signature_image.clone().filter(|s| !s.is_empty()),
            last_modified: now,
            modified_by: modified_by.to_string(),
        })
    }

    pub fn warnings(&self) -> Vec<DraftWarning> {
        let mut warnings = Vec::new();
        if self.payment_method == PaymentMethod::Check && self.normalized_check_number().is_none() {
            warnings.push(DraftWarning::MissingCheckNumber);
        }
        warnings
    }

    fn normalized_check_number(&self) -> Option<String> {
        self.check_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }

    fn to_checked_details(&self) -> Result<ItemDetails, ValidationError> {
        let details = self.item.to_details();
        if let ItemDetails::Watch { brand, .. } = &details {
            if brand.is_empty() {
                return Err(ValidationError::MissingBrand);
            }
        }
        Ok(details)
    }

    fn resolve_store_location(&self, settings: &GeneralSettings) -> Result<String, ValidationError> {
        let wanted = self.store_location.trim();
        if wanted.is_empty() {
            return settings
                .stores
                .first()
                .map(|s| s.name.clone())
                .ok_or(ValidationError::NoStoreLocations);
        }
        settings
            .find_store(wanted)
            .map(|s| s.name.clone())
            .ok_or_else(|| ValidationError::UnknownStoreLocation(wanted.to_string()))
    }

    /// Assemble the document for a validated draft
    pub fn into_transaction(
        self,
        validated: ValidatedDraft,
        created_by: &str,
        now: DateTime<Utc>,
    ) -> Transaction {
        let check_number = self.normalized_check_number();
        Transaction {
            id: String::new(),
            customer_name: self.customer_name.trim().to_string(),
            customer_id: self.customer_id.trim().to_string(),
            phone: self.phone.trim().to_string(),
            item_description: self.item_description.trim().to_string(),
            item: validated.item,
            price: validated.price,
            payment_method: self.payment_method,
            check_number,
            store_location: validated.store_location,
            notes: self.notes,
            id_image: self.id_image.filter(|img| !img.is_empty()),
            signature_image: validated.signature_image,
            date: now,
            created_by: created_by.to_string(),
            last_modified: None,
            modified_by: None,
        }
    }
}

/// Partial write for an edited purchase.
///
/// Carries no `id`, `date` or `created_by`: an edit can never move a
/// purchase in time or change who recorded it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionPatch {
    pub customer_name: String,
    pub customer_id: String,
    pub phone: String,
    pub item_description: String,
    pub item: ItemDetails,
    pub price: f64,
    pub payment_method: PaymentMethod,
    pub check_number: Option<String>,
    /// `None` keeps the stored location
    pub store_location: Option<String>,
    pub notes: String,
    pub id_image: Option<String>,
    /// `None` keeps the stored signature
    pub signature_image: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub modified_by: String,
}

impl TransactionPatch {
    pub fn apply_to(&self, tx: &mut Transaction) {
        tx.customer_name = self.customer_name.clone();
        tx.customer_id = self.customer_id.clone();
        tx.phone = self.phone.clone();
        tx.item_description = self.item_description.clone();
        tx.item = self.item.clone();
        tx.price = self.price;
        tx.payment_method = self.payment_method;
        tx.check_number = self.check_number.clone();
        if let Some(location) = &self.store_location {
            tx.store_location = location.clone();
        }
        tx.notes = self.notes.clone();
        tx.id_image = self.id_image.clone();
        if let Some(sig) = &self.signature_image {
            tx.signature_image = sig.clone();
        }
        tx.last_modified = Some(self.last_modified);
        tx.modified_by = Some(self.modified_by.clone());
    }
}

/// Strip currency decoration the operator may type
fn clean_number(input: &str) -> String {
    input
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect()
}

/// Parse a weight, carat or edited price. Anything that is not a finite,
/// non-negative number becomes 0.
pub fn parse_measurement(input: &str) -> f64 {
    clean_number(input)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

/// Parse a price for a new purchase; only finite positive amounts pass
pub fn parse_price(input: &str) -> Option<f64> {
    clean_number(input)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}
