diesel::table! {
    products (product_id) {
        product_id -> Varchar,
        product_name -> Varchar,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    order_details (id) {
        id -> Int8,
        order_date -> Date,
        product_id -> Varchar,
        product_name -> Varchar,
        quantity -> Int4,
        shipped_so_far -> Int4,
        remaining -> Int4,
        is_completed -> Bool,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    daily_shipments (id) {
        id -> Int8,
        shipment_date -> Date,
        product_id -> Varchar,
        product_name -> Varchar,
        shipped_quantity -> Int4,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    products,
    order_details,
    daily_shipments,
);
