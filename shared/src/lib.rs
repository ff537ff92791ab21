use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A completed buy-back purchase as stored in the `purchases` collection.
///
/// Field names serialize in camelCase so documents stay compatible with the
/// records already written by the shop's previous front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Opaque id assigned by the document store
    pub id: String,
    pub customer_name: String,
    /// Driver's license or other government id number
    pub customer_id: String,
    #[serde(default)]
    pub phone: String,
    pub item_description: String,
    /// Item category and its category specific fields (`itemType` tag)
    #[serde(flatten)]
    pub item: ItemDetails,
    /// Amount paid to the customer
    pub price: f64,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_number: Option<String>,
    /// Name of one of the configured store locations
    #[serde(default)]
    pub store_location: String,
    #[serde(default)]
    pub notes: String,
    /// Encoded photo of the customer's id (data URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_image: Option<String>,
    /// Encoded customer signature (data URL)
    pub signature_image: String,
    /// Set once when the purchase is recorded, never moved by an edit
    pub date: DateTime<Utc>,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
}

impl Transaction {
    pub fn item_type(&self) -> ItemType {
        self.item.item_type()
    }
}

/// Category specific item fields.
///
/// Silver and Platinum are recorded as `Gold` items whose `karat` carries the
/// metal name; see [`Karat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "itemType")]
pub enum ItemDetails {
    Gold {
        /// Weight in grams
        weight: f64,
        karat: Karat,
    },
    #[serde(rename_all = "camelCase")]
    Diamond {
        stone_carat: f64,
        #[serde(default)]
        stone_clarity: String,
    },
    #[serde(rename_all = "camelCase")]
    Watch {
        brand: String,
        #[serde(default)]
        model: String,
        #[serde(default)]
        serial_number: String,
    },
}

impl ItemDetails {
    pub fn item_type(&self) -> ItemType {
        match self {
            ItemDetails::Gold { .. } => ItemType::Gold,
            ItemDetails::Diamond { .. } => ItemType::Diamond,
            ItemDetails::Watch { .. } => ItemType::Watch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Gold,
    Diamond,
    Watch,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Gold => write!(f, "Gold"),
            ItemType::Diamond => write!(f, "Diamond"),
            ItemType::Watch => write!(f, "Watch"),
        }
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Gold" => Ok(ItemType::Gold),
            "Diamond" => Ok(ItemType::Diamond),
            "Watch" => Ok(ItemType::Watch),
            other => Err(format!("Unknown item type: {}", other)),
        }
    }
}

/// Gold purity, or the metal name for silver and platinum pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Karat {
    #[serde(rename = "10k")]
    K10,
    #[serde(rename = "14k")]
    K14,
    #[serde(rename = "18k")]
    K18,
    #[serde(rename = "22k")]
    K22,
    #[serde(rename = "24k")]
    K24,
    Silver,
    Platinum,
}

impl Karat {
    pub const ALL: [Karat; 7] = [
        Karat::K10,
        Karat::K14,
        Karat::K18,
        Karat::K22,
        Karat::K24,
        Karat::Silver,
        Karat::Platinum,
    ];

    /// True for the 10k..24k purities, false for Silver and Platinum
    pub fn is_gold_purity(&self) -> bool {
        !matches!(self, Karat::Silver | Karat::Platinum)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Karat::K10 => "10k",
            Karat::K14 => "14k",
            Karat::K18 => "18k",
            Karat::K22 => "22k",
            Karat::K24 => "24k",
            Karat::Silver => "Silver",
            Karat::Platinum => "Platinum",
        }
    }
}

impl Default for Karat {
    fn default() -> Self {
        Karat::K14
    }
}

impl fmt::Display for Karat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Karat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Karat::ALL
            .iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("Unknown karat: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Check,
    Zelle,
    Wire,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "Cash"),
            PaymentMethod::Check => write!(f, "Check"),
            PaymentMethod::Zelle => write!(f, "Zelle"),
            PaymentMethod::Wire => write!(f, "Wire"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Cash" => Ok(PaymentMethod::Cash),
            "Check" => Ok(PaymentMethod::Check),
            "Zelle" => Ok(PaymentMethod::Zelle),
            "Wire" => Ok(PaymentMethod::Wire),
            other => Err(format!("Unknown payment method: {}", other)),
        }
    }
}

/// A named shop location printed on receipts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLocation {
    pub name: String,
    pub address: String,
}

/// Store identity and receipt text, editable from the general settings screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralSettings {
    pub store_name: String,
    pub phone: String,
    /// Seller certification printed on every receipt
    pub terms: String,
    pub stores: Vec<StoreLocation>,
}

impl GeneralSettings {
    pub fn find_store(&self, name: &str) -> Option<&StoreLocation> {
        self.stores.iter().find(|s| s.name == name)
    }
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            store_name: "KB GOLD JEWELRY".to_string(),
            phone: "555-0123".to_string(),
            terms: "I, the seller, certify that I am the legitimate owner of these goods and have \
                    the legal authority to sell them. I certify that they are not stolen. I \
                    understand that once sold, the transaction is final."
                .to_string(),
            stores: vec![StoreLocation {
                name: "Main Store".to_string(),
                address: "123 Main St, Holland, MI".to_string(),
            }],
        }
    }
}

/// Unlock PIN and master reset code
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityCodes {
    pub pin: String,
    pub master_code: String,
}

impl Default for SecurityCodes {
    fn default() -> Self {
        Self {
            pin: "9812".to_string(),
            master_code: "159753".to_string(),
        }
    }
}

// Codes must never end up in logs through a stray {:?}
impl fmt::Debug for SecurityCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityCodes")
            .field("pin", &"****")
            .field("master_code", &"******")
            .finish()
    }
}

/// The singleton settings document (`settings/main`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub general: GeneralSettings,
    #[serde(flatten)]
    pub security: SecurityCodes,
}

/// Analytics period selector on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Weekly,
    Monthly,
    Yearly,
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Weekly => write!(f, "Weekly"),
            Timeframe::Monthly => write!(f, "Monthly"),
            Timeframe::Yearly => write!(f, "Yearly"),
        }
    }
}

/// Aggregates over the purchases recorded since the start of a timeframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodAnalytics {
    pub timeframe: Timeframe,
    /// First local calendar day covered by the window
    pub period_start: NaiveDate,
    pub total_spent_period: f64,
    pub count: usize,
    /// Grams bought per gold purity (10k..24k only)
    pub gold_grams_by_karat: BTreeMap<Karat, f64>,
    pub silver_grams: f64,
    pub platinum_grams: f64,
    pub diamond_carats: f64,
    pub diamond_count: usize,
    /// Watches bought per brand, brand uppercased
    pub watch_brands: BTreeMap<String, usize>,
}

impl PeriodAnalytics {
    /// Total grams of karat gold, excluding silver and platinum
    pub fn gold_grams(&self) -> f64 {
        self.gold_grams_by_karat.values().sum()
    }
}

/// Outer access control state of the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessState {
    Locked,
    Halted,
    Unlocked,
}

/// Connection health shown on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub auth: bool,
    pub gateway: bool,
    pub data_loaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn gold_transaction() -> Transaction {
        Transaction {
            id: "abc123".to_string(),
            customer_name: "Jane Doe".to_string(),
            customer_id: "D123-4567".to_string(),
            phone: "555-1111".to_string(),
            item_description: "Chain".to_string(),
            item: ItemDetails::Gold {
                weight: 5.5,
                karat: Karat::K14,
            },
            price: 100.0,
            payment_method: PaymentMethod::Cash,
            check_number: None,
            store_location: "Main Store".to_string(),
            notes: String::new(),
            id_image: None,
            signature_image: "data:image/png;base64,AAAA".to_string(),
            date: Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap(),
            created_by: "anon-1".to_string(),
            last_modified: None,
            modified_by: None,
        }
    }

    #[test]
    fn test_transaction_serializes_with_document_field_names() {
        let value = serde_json::to_value(gold_transaction()).unwrap();

        assert_eq!(value["itemType"], "Gold");
        assert_eq!(value["karat"], "14k");
        assert_eq!(value["weight"], 5.5);
        assert_eq!(value["customerName"], "Jane Doe");
        assert_eq!(value["paymentMethod"], "Cash");
        assert!(value.get("checkNumber").is_none());
        assert!(value.get("lastModified").is_none());
    }

    #[test]
    fn test_watch_document_parses() {
        let json = serde_json::json!({
            "id": "w1",
            "customerName": "John",
            "customerId": "X1",
            "itemDescription": "Submariner",
            "itemType": "Watch",
            "brand": "Rolex",
            "serialNumber": "S-99",
            "price": 4200.0,
            "paymentMethod": "Wire",
            "signatureImage": "sig",
            "date": "2025-02-01T10:00:00Z",
            "createdBy": "anon"
        });

        let tx: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(tx.item_type(), ItemType::Watch);
        match tx.item {
            ItemDetails::Watch { brand, model, serial_number } => {
                assert_eq!(brand, "Rolex");
                assert_eq!(model, "");
                assert_eq!(serial_number, "S-99");
            }
            other => panic!("expected watch, got {:?}", other),
        }
    }

    #[test]
    fn test_karat_parsing() {
        assert_eq!("14k".parse::<Karat>().unwrap(), Karat::K14);
        assert_eq!("24K".parse::<Karat>().unwrap(), Karat::K24);
        assert_eq!("Platinum".parse::<Karat>().unwrap(), Karat::Platinum);
        assert!("9k".parse::<Karat>().is_err());
        assert!(Karat::K22.is_gold_purity());
        assert!(!Karat::Silver.is_gold_purity());
    }

    #[test]
    fn test_settings_flatten_round_trip() {
        let settings = Settings::default();
        let value = serde_json::to_value(&settings).unwrap();

        assert_eq!(value["storeName"], "KB GOLD JEWELRY");
        assert_eq!(value["pin"], "9812");
        assert_eq!(value["masterCode"], "159753");

        let back: Settings = serde_json::from_value(value).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_security_codes_debug_is_redacted() {
        let rendered = format!("{:?}", SecurityCodes::default());
        assert!(!rendered.contains("9812"));
        assert!(!rendered.contains("159753"));
    }
}
