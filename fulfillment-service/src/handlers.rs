use std::collections::HashMap;

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use shared::{OrderLine, OrderSnapshot, OrderUpdate, ProductSummary, ShipmentLine};
use tracing::info;

use crate::models::*;
use crate::schema::*;

type DbPool = Pool<AsyncPgConnection>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("product id already exists")]
    DuplicateProduct,
    #[error(transparent)]
    Pool(#[from] bb8::RunError<diesel_async::pooled_connection::PoolError>),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

/// All store access goes through this handle. Order progress fields
/// (`shipped_so_far`, `remaining`, `is_completed`) are written only by
/// `create_shipment`'s allocation transaction.
#[derive(Clone)]
pub struct Store {
    pool: DbPool,
}

impl Store {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create_product(
        &self,
        product_id: &str,
        product_name: &str,
    ) -> Result<Product, StoreError> {
        let mut conn = self.pool.get().await?;

        let new_product = NewProduct {
            product_id: product_id.to_owned(),
            product_name: product_name.to_owned(),
        };

        match diesel::insert_into(products::table)
            .values(&new_product)
            .get_result::<Product>(&mut conn)
            .await
        {
            Ok(product) => Ok(product),
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(StoreError::DuplicateProduct)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn create_order(
        &self,
        order_date: NaiveDate,
        product_id: &str,
        product_name: &str,
        quantity: i32,
    ) -> Result<OrderDetail, StoreError> {
        let mut conn = self.pool.get().await?;

        let new_order = NewOrderDetail {
            order_date,
            product_id: product_id.to_owned(),
            product_name: product_name.to_owned(),
            quantity,
            shipped_so_far: 0,
            remaining: quantity,
        };

        let order: OrderDetail = diesel::insert_into(order_details::table)
            .values(&new_order)
            .get_result(&mut conn)
            .await?;

        Ok(order)
    }

    /// Records a shipment and applies its quantity to the product's
    /// outstanding orders, oldest first, in one transaction. The `FOR
    /// UPDATE` lock on the outstanding rows serializes concurrent shipments
    /// for the same product.
    pub async fn create_shipment(
        &self,
        shipment_date: NaiveDate,
        product_id: &str,
        product_name: &str,
        shipped_quantity: i32,
    ) -> Result<(DailyShipment, Vec<OrderUpdate>), StoreError> {
        let mut conn = self.pool.get().await?;

        let new_shipment = NewDailyShipment {
            shipment_date,
            product_id: product_id.to_owned(),
            product_name: product_name.to_owned(),
            shipped_quantity,
        };

        let (shipment, updates, consumed) = self
            .run_allocation(&mut conn, new_shipment, shipped_quantity)
            .await?;

        info!(
            "Recorded shipment {} for product {}: {} order(s) updated",
            shipment.id,
            shipment.product_id,
            updates.len()
        );
        let surplus = shipped_quantity - consumed;
        if surplus > 0 {
            // excess beyond all outstanding demand is dropped, not banked
            info!(
                "Shipment {} left {} unit(s) unattributed for product {}",
                shipment.id, surplus, shipment.product_id
            );
        }

        Ok((shipment, updates))
    }

    async fn run_allocation(
        &self,
        conn: &mut AsyncPgConnection,
        new_shipment: NewDailyShipment,
        shipped_quantity: i32,
    ) -> Result<(DailyShipment, Vec<OrderUpdate>, i32), StoreError> {
        let result = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                Box::pin(async move {
                    let shipment: DailyShipment = diesel::insert_into(daily_shipments::table)
                        .values(&new_shipment)
                        .get_result(conn)
                        .await?;

                    let outstanding: Vec<OrderDetail> = order_details::table
                        .filter(order_details::product_id.eq(&shipment.product_id))
                        .filter(order_details::is_completed.eq(false))
                        .order((order_details::order_date.asc(), order_details::id.asc()))
                        .for_update()
                        .load(conn)
                        .await?;

                    let snapshots: Vec<OrderSnapshot> =
                        outstanding.iter().map(OrderSnapshot::from).collect();
                    let updates = shared::allocate(&snapshots, shipped_quantity);

                    for update in &updates {
                        diesel::update(order_details::table.filter(order_details::id.eq(update.order_id)))
                            .set((
                                order_details::shipped_so_far.eq(update.shipped_so_far),
                                order_details::remaining.eq(update.remaining),
                                order_details::is_completed.eq(update.is_completed),
                            ))
                            .execute(conn)
                            .await?;
                    }

                    let prior: HashMap<i64, i32> = outstanding
                        .iter()
                        .map(|o| (o.id, o.shipped_so_far))
                        .collect();
                    let consumed: i32 = updates
                        .iter()
                        .map(|u| u.shipped_so_far - prior[&u.order_id])
                        .sum();

                    Ok((shipment, updates, consumed))
                })
            })
            .await?;

        Ok(result)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows = products::table
            .order(products::product_id.asc())
            .load(&mut conn)
            .await?;
        Ok(rows)
    }

    pub async fn list_orders(&self) -> Result<Vec<OrderDetail>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows = order_details::table
            .order(order_details::order_date.desc())
            .load(&mut conn)
            .await?;
        Ok(rows)
    }

    pub async fn list_shipments(&self) -> Result<Vec<DailyShipment>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows = daily_shipments::table
            .order(daily_shipments::shipment_date.desc())
            .load(&mut conn)
            .await?;
        Ok(rows)
    }

    pub async fn summary(&self, year: i32, month: u32) -> Result<Vec<ProductSummary>, StoreError> {
        let (orders, shipments) = self.report_lines().await?;
        Ok(shared::summarize(&orders, &shipments, year, month))
    }

    pub async fn shortfall_map(
        &self,
    ) -> Result<std::collections::BTreeMap<String, i64>, StoreError> {
        let (orders, shipments) = self.report_lines().await?;
        Ok(shared::shortfall_map(&orders, &shipments))
    }

    // Reporting reads the raw rows every time; allocation runs change them
    // underneath, so nothing here may be cached.
    async fn report_lines(&self) -> Result<(Vec<OrderLine>, Vec<ShipmentLine>), StoreError> {
        let mut conn = self.pool.get().await?;

        let orders: Vec<(String, String, i32)> = order_details::table
            .select((
                order_details::product_id,
                order_details::product_name,
                order_details::quantity,
            ))
            .order(order_details::id.asc())
            .load(&mut conn)
            .await?;

        let shipments: Vec<(String, i32, NaiveDate)> = daily_shipments::table
            .select((
                daily_shipments::product_id,
                daily_shipments::shipped_quantity,
                daily_shipments::shipment_date,
            ))
            .load(&mut conn)
            .await?;

        Ok((
            orders
                .into_iter()
                .map(|(product_id, product_name, quantity)| OrderLine {
                    product_id,
                    product_name,
                    quantity,
                })
                .collect(),
            shipments
                .into_iter()
                .map(|(product_id, shipped_quantity, shipment_date)| ShipmentLine {
                    product_id,
                    shipped_quantity,
                    shipment_date,
                })
                .collect(),
        ))
    }
}
