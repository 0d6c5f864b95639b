use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use shared::OrderSnapshot;

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::products, primary_key(product_id))]
pub struct Product {
    pub product_id: String,
    pub product_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::products)]
pub struct NewProduct {
    pub product_id: String,
    pub product_name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::order_details)]
pub struct OrderDetail {
    pub id: i64,
    pub order_date: NaiveDate,
    pub product_id: String,
    // denormalized snapshot of the product name at order entry; never re-synced
    pub product_name: String,
    pub quantity: i32,
    pub shipped_so_far: i32,
    pub remaining: i32,
    pub is_completed: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::order_details)]
pub struct NewOrderDetail {
    pub order_date: NaiveDate,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i32,
    pub shipped_so_far: i32,
    pub remaining: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::daily_shipments)]
pub struct DailyShipment {
    pub id: i64,
    pub shipment_date: NaiveDate,
    pub product_id: String,
    pub product_name: String,
    pub shipped_quantity: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::daily_shipments)]
pub struct NewDailyShipment {
    pub shipment_date: NaiveDate,
    pub product_id: String,
    pub product_name: String,
    pub shipped_quantity: i32,
}

impl From<&OrderDetail> for OrderSnapshot {
    fn from(order: &OrderDetail) -> Self {
        Self {
            order_id: order.id,
            quantity: order.quantity,
            shipped_so_far: order.shipped_so_far,
        }
    }
}
