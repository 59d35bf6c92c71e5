//! Order document schema posted to the ingestion endpoint.
//!
//! Field names and nesting mirror the wire format exactly, so the types here
//! are mostly plain data. The dispatcher never inspects them beyond the
//! top-level `code` field.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading an order template from disk.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read template file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse template JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Comments {
    pub customer_comment: String,
    pub vendor_comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub mobile_phone: String,
    pub code: String,
    pub id: String,
    pub mobile_phone_country_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub postcode: u32,
    pub city: String,
    pub street: String,
    pub number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub address: Address,
    pub expected_delivery_time: DateTime<Utc>,
    pub express_delivery: bool,
    pub rider_pickup_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    pub name: String,
    pub amount: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExtraParameters {
    pub property1: String,
    pub property2: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LocalInfo {
    pub country_code: String,
    pub currency_symbol: String,
    pub platform: String,
    pub platform_key: String,
    pub currency_symbol_position: String,
    pub currency_symbol_spaces: String,
    pub decimal_digits: String,
    pub decimal_separator: String,
    pub email: String,
    pub phone: String,
    pub thousands_separator: String,
    pub website: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub remote_code: String,
    pub required_money_change: String,
    pub vat_id: String,
    pub vat_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlatformRestaurant {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeliveryFee {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    pub delivery_fees: Vec<DeliveryFee>,
    pub grand_total: String,
    pub minimum_delivery_value: String,
    pub pay_restaurant: String,
    pub rider_tip: String,
    pub sub_total: String,
    pub vat_total: String,
    /// Spelled this way on the wire.
    pub comission: String,
    pub container_charge: String,
    pub delivery_fee: String,
    pub collect_from_customer: String,
    pub discount_amount_total: String,
    pub delivery_fee_discount: String,
    pub service_fee_percent: String,
    pub service_fee_total: String,
    pub service_tax: i64,
    pub service_tax_value: i64,
    pub difference_to_minimum_delivery_value: String,
    pub vat_visible: bool,
    pub vat_percent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Topping {
    pub children: Vec<Value>,
    pub name: String,
    pub price: String,
    pub quantity: i64,
    pub id: String,
    pub remote_code: Option<Value>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Variation {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub category_name: String,
    pub name: String,
    pub paid_price: String,
    pub quantity: String,
    pub remote_code: String,
    pub selected_toppings: Vec<Topping>,
    pub unit_price: String,
    pub comment: String,
    pub description: String,
    pub discount_amount: String,
    pub half_half: bool,
    pub id: String,
    pub selected_choices: Vec<Value>,
    pub variation: Variation,
    pub vat_percentage: String,
}

/// Serializes as an empty object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IntegrationInfo {}

/// One complete order document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub token: String,
    pub code: String,
    pub comments: Comments,
    pub created_at: DateTime<Utc>,
    pub customer: Customer,
    pub delivery: Delivery,
    pub discounts: Vec<Discount>,
    pub expedition_type: String,
    pub expiry_date: DateTime<Utc>,
    pub extra_parameters: ExtraParameters,
    pub local_info: LocalInfo,
    pub payment: Payment,
    pub test: bool,
    pub short_code: String,
    pub pre_order: bool,
    pub pickup: Option<Value>,
    pub platform_restaurant: PlatformRestaurant,
    pub price: Price,
    pub products: Vec<Product>,
    pub corporate_order: bool,
    pub corporate_tax_id: String,
    pub integration_info: IntegrationInfo,
    pub mobile_order: bool,
    pub web_order: bool,
    pub vouchers: Vec<Value>,
}

impl OrderPayload {
    /// Loads a template order from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, TemplateError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, TemplateError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The built-in canonical order: one express delivery with two products.
    ///
    /// Timestamps are fixed so every run posts identical documents apart
    /// from the `code` field.
    pub fn canonical() -> Self {
        let at = |h: u32, m: u32| {
            Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0)
                .single()
                .unwrap_or_default()
        };

        OrderPayload {
            token: "a1b2c3d4-e5f6-7a8b-9c0d-e1f2a3b4c5d6".to_string(),
            code: String::new(),
            comments: Comments {
                customer_comment: "Please ring the bell twice".to_string(),
                vendor_comment: String::new(),
            },
            created_at: at(12, 0),
            customer: Customer {
                email: "jane.doe@example.com".to_string(),
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
                mobile_phone: "5551234567".to_string(),
                code: "CUST-0001".to_string(),
                id: "customer-0001".to_string(),
                mobile_phone_country_code: "+1".to_string(),
            },
            delivery: Delivery {
                address: Address {
                    postcode: 10115,
                    city: "Berlin".to_string(),
                    street: "Invalidenstrasse".to_string(),
                    number: 117,
                },
                expected_delivery_time: at(12, 45),
                express_delivery: true,
                rider_pickup_time: at(12, 25),
            },
            discounts: vec![Discount {
                name: "Lunch deal".to_string(),
                amount: "2.00".to_string(),
                kind: "FIXED".to_string(),
            }],
            expedition_type: "delivery".to_string(),
            expiry_date: at(13, 0),
            extra_parameters: ExtraParameters {
                property1: "value1".to_string(),
                property2: "value2".to_string(),
            },
            local_info: LocalInfo {
                country_code: "de".to_string(),
                currency_symbol: "EUR".to_string(),
                platform: "Web".to_string(),
                platform_key: "web_de".to_string(),
                currency_symbol_position: "right".to_string(),
                currency_symbol_spaces: "1".to_string(),
                decimal_digits: "2".to_string(),
                decimal_separator: ",".to_string(),
                email: "support@example.com".to_string(),
                phone: "+49 30 1234567".to_string(),
                thousands_separator: ".".to_string(),
                website: "https://www.example.com".to_string(),
            },
            payment: Payment {
                status: "paid".to_string(),
                kind: "card".to_string(),
                remote_code: "PAY-CARD".to_string(),
                required_money_change: "0.00".to_string(),
                vat_id: "DE123456789".to_string(),
                vat_name: "Example Foods GmbH".to_string(),
            },
            test: true,
            short_code: "42".to_string(),
            pre_order: false,
            pickup: None,
            platform_restaurant: PlatformRestaurant {
                id: "restaurant-0042".to_string(),
            },
            price: Price {
                delivery_fees: vec![DeliveryFee {
                    name: "Standard delivery".to_string(),
                    value: 2.5,
                }],
                grand_total: "24.40".to_string(),
                minimum_delivery_value: "10.00".to_string(),
                pay_restaurant: "21.90".to_string(),
                rider_tip: "1.00".to_string(),
                sub_total: "22.90".to_string(),
                vat_total: "3.66".to_string(),
                comission: "3.44".to_string(),
                container_charge: "0.00".to_string(),
                delivery_fee: "2.50".to_string(),
                collect_from_customer: "0.00".to_string(),
                discount_amount_total: "2.00".to_string(),
                delivery_fee_discount: "0.00".to_string(),
                service_fee_percent: "0".to_string(),
                service_fee_total: "0.00".to_string(),
                service_tax: 0,
                service_tax_value: 0,
                difference_to_minimum_delivery_value: "0.00".to_string(),
                vat_visible: true,
                vat_percent: "19".to_string(),
            },
            products: vec![
                Product {
                    category_name: "Pizza".to_string(),
                    name: "Margherita".to_string(),
                    paid_price: "15.90".to_string(),
                    quantity: "1".to_string(),
                    remote_code: "PZ-MARG".to_string(),
                    selected_toppings: vec![Topping {
                        children: Vec::new(),
                        name: "Extra mozzarella".to_string(),
                        price: "1.50".to_string(),
                        quantity: 1,
                        id: "topping-0007".to_string(),
                        remote_code: None,
                        kind: "EXTRA".to_string(),
                    }],
                    unit_price: "14.40".to_string(),
                    comment: "Well done".to_string(),
                    description: "Tomato, mozzarella, basil".to_string(),
                    discount_amount: "0.00".to_string(),
                    half_half: false,
                    id: "product-0001".to_string(),
                    selected_choices: Vec::new(),
                    variation: Variation {
                        name: "32cm".to_string(),
                    },
                    vat_percentage: "19".to_string(),
                },
                Product {
                    category_name: "Drinks".to_string(),
                    name: "Sparkling water".to_string(),
                    paid_price: "7.00".to_string(),
                    quantity: "2".to_string(),
                    remote_code: "DR-WATER".to_string(),
                    selected_toppings: Vec::new(),
                    unit_price: "3.50".to_string(),
                    comment: String::new(),
                    description: "0.75l bottle".to_string(),
                    discount_amount: "0.00".to_string(),
                    half_half: false,
                    id: "product-0002".to_string(),
                    selected_choices: Vec::new(),
                    variation: Variation {
                        name: "0.75l".to_string(),
                    },
                    vat_percentage: "19".to_string(),
                },
            ],
            corporate_order: false,
            corporate_tax_id: String::new(),
            integration_info: IntegrationInfo {},
            mobile_order: false,
            web_order: true,
            vouchers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn wire_names_are_camel_case() {
        let json = serde_json::to_value(OrderPayload::canonical()).unwrap();

        assert!(json.get("expeditionType").is_some());
        assert!(json.get("platformRestaurant").is_some());
        assert!(json.get("corporateTaxId").is_some());
        assert_eq!(json["customer"]["mobilePhoneCountryCode"], "+1");
        assert_eq!(json["price"]["comission"], "3.44");
        assert_eq!(json["price"]["deliveryFees"][0]["value"], 2.5);
        assert_eq!(json["payment"]["type"], "card");
        assert_eq!(json["products"][0]["selectedToppings"][0]["type"], "EXTRA");
        assert_eq!(json["integrationInfo"], serde_json::json!({}));
        assert!(json["pickup"].is_null());
    }

    #[test]
    fn template_loads_from_file() {
        let canonical = OrderPayload::canonical();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&canonical).unwrap().as_bytes())
            .unwrap();

        let loaded = OrderPayload::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, canonical);
    }

    #[test]
    fn malformed_template_is_rejected() {
        let err = OrderPayload::from_json_str(r#"{"code": 5}"#).unwrap_err();
        assert!(matches!(err, TemplateError::JsonParse(_)));
    }

    #[test]
    fn missing_template_file_is_rejected() {
        let err = OrderPayload::from_json_file("/nonexistent/template.json").unwrap_err();
        assert!(matches!(err, TemplateError::FileRead(_)));
    }
}
