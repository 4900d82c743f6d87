//! PostgreSQL store.
//!
//! Queries are built at runtime with `sqlx::query_as` so the crate compiles without a
//! live database. Enums travel as upper-case `TEXT` and are parsed back on read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, Transaction};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use super::{ChangeOutcome, OrderDraft, OrderFilter, StatusChange, Store, ORDER_NUMBER_ATTEMPTS};
use crate::domain::aggregates::{
    Author, CustomerContact, Order, OrderItem, OrderStatus, Product, ProductImage, ProductSpec, PromoCode,
    PromoRejection, Review, SideEffect, SupportChat, SupportMessage,
};
use crate::domain::value_objects::{OrderNumber, PromoCodeKey, Rating};
use crate::{Result, ShopError};

const PRODUCT_COLUMNS: &str = "id, name, slug, description, price, old_price, stock, sku, brand, is_active, \
     category_id, created_at, updated_at";
const PROMO_COLUMNS: &str = "id, code, description, discount_type, value, min_order, max_uses, used_count, \
     is_active, expires_at, created_at";
const ORDER_COLUMNS: &str = "id, order_number, user_id, status, payment_status, customer_name, customer_email, \
     customer_phone, delivery_address, delivery_cost, subtotal, discount, total, promo_code_id, notes, \
     created_at, updated_at";
const REVIEW_COLUMNS: &str = "id, user_id, product_id, rating, comment, admin_reply, is_auto_reply, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    async fn items_for(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, order_id, product_id, product_name, quantity, price FROM order_items \
             WHERE order_id = ANY($1) ORDER BY order_id, line_no",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;
        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row.into());
        }
        Ok(grouped)
    }

    async fn messages_for(&self, chat_id: Uuid) -> Result<Vec<SupportMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, chat_id, content, is_admin, created_at FROM support_messages \
             WHERE chat_id = $1 ORDER BY created_at, id",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn chat_with_messages(&self, row: ChatRow) -> Result<SupportChat> {
        let messages = self.messages_for(row.id).await?;
        row.into_chat(messages)
    }
}

fn parse<T: FromStr<Err = String>>(raw: &str) -> Result<T> {
    raw.parse().map_err(ShopError::Corrupt)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn next_order_number(at: DateTime<Utc>) -> OrderNumber {
    OrderNumber::generate(at, &mut rand::thread_rng())
}

async fn order_items_in(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> Result<Vec<OrderItem>> {
    let rows = sqlx::query_as::<_, ItemRow>(
        "SELECT id, order_id, product_id, product_name, quantity, price FROM order_items \
         WHERE order_id = $1 ORDER BY line_no",
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

// =============================================================================
// Rows
// =============================================================================

#[derive(FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    slug: String,
    description: String,
    price: i64,
    old_price: Option<i64>,
    stock: i32,
    sku: Option<String>,
    brand: Option<String>,
    is_active: bool,
    category_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ImageRow { url: String, alt: Option<String>, sort_order: i32 }

#[derive(FromRow)]
struct SpecRow { spec_group: String, name: String, value: String }

#[derive(FromRow)]
struct PromoRow {
    id: Uuid,
    code: String,
    description: Option<String>,
    discount_type: String,
    value: i64,
    min_order: i64,
    max_uses: Option<i32>,
    used_count: i32,
    is_active: bool,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PromoRow> for PromoCode {
    type Error = ShopError;
    fn try_from(r: PromoRow) -> Result<Self> {
        Ok(PromoCode {
            id: r.id,
            code: PromoCodeKey::new(&r.code).map_err(|e| ShopError::Corrupt(format!("promo {}: {e}", r.id)))?,
            description: r.description,
            discount_type: parse(&r.discount_type)?,
            value: r.value,
            min_order: r.min_order,
            max_uses: r.max_uses,
            used_count: r.used_count,
            is_active: r.is_active,
            expires_at: r.expires_at,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Option<Uuid>,
    status: String,
    payment_status: String,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    delivery_address: String,
    delivery_cost: i64,
    subtotal: i64,
    discount: i64,
    total: i64,
    promo_code_id: Option<Uuid>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order> {
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            status: parse(&self.status)?,
            payment_status: parse(&self.payment_status)?,
            customer: CustomerContact {
                name: self.customer_name,
                email: self.customer_email,
                phone: self.customer_phone,
                delivery_address: self.delivery_address,
            },
            delivery_cost: self.delivery_cost,
            subtotal: self.subtotal,
            discount: self.discount,
            total: self.total,
            promo_code_id: self.promo_code_id,
            notes: self.notes,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ItemRow { id: Uuid, order_id: Uuid, product_id: Uuid, product_name: String, quantity: i32, price: i64 }

impl From<ItemRow> for OrderItem {
    fn from(r: ItemRow) -> Self {
        OrderItem { id: r.id, product_id: r.product_id, product_name: r.product_name, quantity: r.quantity, price: r.price }
    }
}

#[derive(FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    rating: i32,
    comment: String,
    admin_reply: Option<String>,
    is_auto_reply: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = ShopError;
    fn try_from(r: ReviewRow) -> Result<Self> {
        Ok(Review {
            id: r.id,
            user_id: r.user_id,
            product_id: r.product_id,
            rating: Rating::new(r.rating).map_err(|e| ShopError::Corrupt(e.to_string()))?,
            comment: r.comment,
            admin_reply: r.admin_reply,
            is_auto_reply: r.is_auto_reply,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ChatRow { id: Uuid, user_id: Uuid, status: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

impl ChatRow {
    fn into_chat(self, messages: Vec<SupportMessage>) -> Result<SupportChat> {
        Ok(SupportChat {
            id: self.id,
            user_id: self.user_id,
            status: parse(&self.status)?,
            messages,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct MessageRow { id: Uuid, chat_id: Uuid, content: String, is_admin: bool, created_at: DateTime<Utc> }

impl From<MessageRow> for SupportMessage {
    fn from(r: MessageRow) -> Self {
        SupportMessage { id: r.id, chat_id: r.chat_id, content: r.content, is_admin: r.is_admin, created_at: r.created_at }
    }
}

// =============================================================================
// Store
// =============================================================================

#[async_trait]
impl Store for PgStore {
    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let Some(row) = sqlx::query_as::<_, ProductRow>(&sql).bind(id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let images = sqlx::query_as::<_, ImageRow>(
            "SELECT url, alt, sort_order FROM product_images WHERE product_id = $1 ORDER BY sort_order",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let specs = sqlx::query_as::<_, SpecRow>(
            "SELECT spec_group, name, value FROM product_specs WHERE product_id = $1 ORDER BY sort_order",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Product {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            old_price: row.old_price,
            stock: row.stock,
            sku: row.sku,
            brand: row.brand,
            is_active: row.is_active,
            category_id: row.category_id,
            images: images.into_iter().map(|i| ProductImage { url: i.url, alt: i.alt, sort_order: i.sort_order }).collect(),
            specs: specs.into_iter().map(|s| ProductSpec { group: s.spec_group, name: s.name, value: s.value }).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn promo(&self, id: Uuid) -> Result<Option<PromoCode>> {
        let sql = format!("SELECT {PROMO_COLUMNS} FROM promo_codes WHERE id = $1");
        sqlx::query_as::<_, PromoRow>(&sql).bind(id).fetch_optional(&self.pool).await?.map(PromoCode::try_from).transpose()
    }

    async fn promo_by_code(&self, code: &PromoCodeKey) -> Result<Option<PromoCode>> {
        let sql = format!("SELECT {PROMO_COLUMNS} FROM promo_codes WHERE code = $1");
        sqlx::query_as::<_, PromoRow>(&sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(PromoCode::try_from)
            .transpose()
    }

    async fn promos(&self) -> Result<Vec<PromoCode>> {
        let sql = format!("SELECT {PROMO_COLUMNS} FROM promo_codes ORDER BY created_at DESC");
        sqlx::query_as::<_, PromoRow>(&sql).fetch_all(&self.pool).await?.into_iter().map(PromoCode::try_from).collect()
    }

    async fn insert_promo(&self, promo: &PromoCode) -> Result<()> {
        let inserted = sqlx::query(
            "INSERT INTO promo_codes (id, code, description, discount_type, value, min_order, max_uses, used_count, \
             is_active, expires_at, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(promo.id)
        .bind(promo.code.as_str())
        .bind(&promo.description)
        .bind(promo.discount_type.as_str())
        .bind(promo.value)
        .bind(promo.min_order)
        .bind(promo.max_uses)
        .bind(promo.used_count)
        .bind(promo.is_active)
        .bind(promo.expires_at)
        .bind(promo.created_at)
        .execute(&self.pool)
        .await;
        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(ShopError::Conflict(format!("Promo code {} already exists", promo.code))),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_promo(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM promo_codes WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn place_order(&self, draft: &OrderDraft) -> Result<Order> {
        // Dropping `tx` on any early return rolls every write back.
        let mut tx = self.pool.begin().await?;

        for line in draft.lines_in_lock_order() {
            let taken = sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = NOW() \
                 WHERE id = $1 AND is_active AND stock >= $2",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
            if taken.rows_affected() == 0 {
                let active: Option<(bool,)> = sqlx::query_as("SELECT is_active FROM products WHERE id = $1")
                    .bind(line.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                return Err(match active {
                    Some((true,)) => ShopError::InsufficientStock { product: line.product_name.clone() },
                    _ => ShopError::ProductUnavailable(line.product_id),
                });
            }
        }

        if let Some(redemption) = draft.promo {
            let sql = format!("SELECT {PROMO_COLUMNS} FROM promo_codes WHERE id = $1 FOR UPDATE");
            let promo: PromoCode = sqlx::query_as::<_, PromoRow>(&sql)
                .bind(redemption.promo_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(PromoRejection::NotFound)?
                .try_into()?;
            let applied = promo.evaluate(draft.totals.subtotal, draft.placed_at)?;
            if applied.discount != redemption.discount {
                return Err(ShopError::Conflict("Promo code has changed, please apply it again".into()));
            }
            let redeemed = sqlx::query(
                "UPDATE promo_codes SET used_count = used_count + 1 \
                 WHERE id = $1 AND (max_uses IS NULL OR used_count < max_uses)",
            )
            .bind(promo.id)
            .execute(&mut *tx)
            .await?;
            if redeemed.rows_affected() == 0 {
                return Err(PromoRejection::UsageLimitExceeded.into());
            }
        }

        let mut number = None;
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let candidate = next_order_number(draft.placed_at);
            let inserted: Option<(Uuid,)> = sqlx::query_as(
                "INSERT INTO orders (id, order_number, user_id, status, payment_status, customer_name, customer_email, \
                 customer_phone, delivery_address, delivery_cost, subtotal, discount, total, promo_code_id, notes, \
                 created_at, updated_at) \
                 VALUES ($1, $2, $3, 'PENDING', 'PENDING', $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14) \
                 ON CONFLICT (order_number) DO NOTHING RETURNING id",
            )
            .bind(draft.id)
            .bind(candidate.as_str())
            .bind(draft.user_id)
            .bind(&draft.customer.name)
            .bind(&draft.customer.email)
            .bind(&draft.customer.phone)
            .bind(&draft.customer.delivery_address)
            .bind(draft.totals.delivery_cost)
            .bind(draft.totals.subtotal)
            .bind(draft.totals.discount)
            .bind(draft.totals.total)
            .bind(draft.promo.map(|p| p.promo_id))
            .bind(&draft.notes)
            .bind(draft.placed_at)
            .fetch_optional(&mut *tx)
            .await?;
            if inserted.is_some() {
                number = Some(candidate);
                break;
            }
            tracing::debug!(order_number = %candidate, "order number taken, drawing another");
        }
        let number = number.ok_or_else(|| ShopError::Conflict("Could not allocate an order number, please retry".into()))?;

        for (line_no, line) in (1_i32..).zip(&draft.lines) {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, line_no, product_id, product_name, quantity, price) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(line.id)
            .bind(draft.id)
            .bind(line_no)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(draft.to_order(number.into_string()))
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let Some(row) = sqlx::query_as::<_, OrderRow>(&sql).bind(id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let items = self.items_for(&[id]).await?.remove(&id).unwrap_or_default();
        row.into_order(items).map(Some)
    }

    async fn orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE ($1::uuid IS NULL OR user_id = $1) AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(filter.user_id)
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.items_for(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }

    async fn change_order_status(&self, id: Uuid, change: &StatusChange) -> Result<ChangeOutcome> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(String, Option<Uuid>)> =
            sqlx::query_as("SELECT status, promo_code_id FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let (status, promo_code_id) = locked.ok_or(ShopError::NotFound("Order"))?;
        let current: OrderStatus = parse(&status)?;
        if current != change.expected {
            return Ok(ChangeOutcome::StatusMoved);
        }

        let mut next = current;
        if let Some(t) = change.transition.filter(|t| !t.is_noop()) {
            if t.has(SideEffect::RestoreStock) {
                sqlx::query(
                    "SELECT id FROM products WHERE id IN (SELECT product_id FROM order_items WHERE order_id = $1) \
                     ORDER BY id FOR UPDATE",
                )
                .bind(id)
                .execute(&mut *tx)
                .await?;
                sqlx::query(
                    "UPDATE products p SET stock = p.stock + s.qty, updated_at = NOW() \
                     FROM (SELECT product_id, SUM(quantity)::int AS qty FROM order_items \
                           WHERE order_id = $1 GROUP BY product_id) s \
                     WHERE p.id = s.product_id",
                )
                .bind(id)
                .execute(&mut *tx)
                .await?;
            }
            if let (true, Some(promo_id)) = (t.has(SideEffect::ReleasePromoUsage), promo_code_id) {
                sqlx::query("UPDATE promo_codes SET used_count = GREATEST(used_count - 1, 0) WHERE id = $1")
                    .bind(promo_id)
                    .execute(&mut *tx)
                    .await?;
            }
            next = t.to;
        }

        let sql = format!(
            "UPDATE orders SET status = $2, payment_status = COALESCE($3, payment_status), updated_at = NOW() \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(next.as_str())
            .bind(change.payment_status.map(|p| p.as_str()))
            .fetch_one(&mut *tx)
            .await?;
        let items = order_items_in(&mut tx, id).await?;
        tx.commit().await?;
        Ok(ChangeOutcome::Applied(row.into_order(items)?))
    }

    async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> Result<bool> {
        let purchased: Vec<&str> =
            OrderStatus::ALL.iter().filter(|s| s.counts_as_purchase()).map(|s| s.as_str()).collect();
        let (found,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM orders o JOIN order_items i ON i.order_id = o.id \
             WHERE o.user_id = $1 AND i.product_id = $2 AND o.status = ANY($3))",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(&purchased)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn review_by_author(&self, user_id: Uuid, product_id: Uuid) -> Result<Option<Review>> {
        let sql = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE user_id = $1 AND product_id = $2");
        sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(user_id)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Review::try_from)
            .transpose()
    }

    async fn insert_review(&self, review: &Review) -> Result<()> {
        let inserted = sqlx::query(
            "INSERT INTO reviews (id, user_id, product_id, rating, comment, admin_reply, is_auto_reply, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(review.id)
        .bind(review.user_id)
        .bind(review.product_id)
        .bind(i32::from(review.rating))
        .bind(&review.comment)
        .bind(&review.admin_reply)
        .bind(review.is_auto_reply)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await;
        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(ShopError::AlreadyReviewed),
            Err(e) => Err(e.into()),
        }
    }

    async fn reviews_for(&self, product_id: Uuid) -> Result<Vec<Review>> {
        let sql = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE product_id = $1 ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Review::try_from)
            .collect()
    }

    async fn reply_to_review(&self, id: Uuid, reply: &str) -> Result<Option<Review>> {
        let sql = format!(
            "UPDATE reviews SET admin_reply = $2, is_auto_reply = FALSE, updated_at = NOW() \
             WHERE id = $1 RETURNING {REVIEW_COLUMNS}"
        );
        sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(id)
            .bind(reply.trim())
            .fetch_optional(&self.pool)
            .await?
            .map(Review::try_from)
            .transpose()
    }

    async fn open_chat(&self, user_id: Uuid) -> Result<SupportChat> {
        // Two racing requests both insert; the partial unique index keeps one.
        sqlx::query(
            "INSERT INTO support_chats (id, user_id, status, created_at, updated_at) \
             VALUES ($1, $2, 'open', NOW(), NOW()) \
             ON CONFLICT (user_id) WHERE status = 'open' DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        let row = sqlx::query_as::<_, ChatRow>(
            "SELECT id, user_id, status, created_at, updated_at FROM support_chats \
             WHERE user_id = $1 AND status = 'open'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        self.chat_with_messages(row).await
    }

    async fn chat(&self, id: Uuid) -> Result<Option<SupportChat>> {
        let row = sqlx::query_as::<_, ChatRow>(
            "SELECT id, user_id, status, created_at, updated_at FROM support_chats WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => self.chat_with_messages(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn chats(&self) -> Result<Vec<SupportChat>> {
        let rows = sqlx::query_as::<_, ChatRow>(
            "SELECT id, user_id, status, created_at, updated_at FROM support_chats ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        let latest = sqlx::query_as::<_, MessageRow>(
            "SELECT DISTINCT ON (chat_id) id, chat_id, content, is_admin, created_at FROM support_messages \
             ORDER BY chat_id, created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut latest: HashMap<Uuid, SupportMessage> = latest.into_iter().map(|m| (m.chat_id, m.into())).collect();
        rows.into_iter()
            .map(|row| {
                let last = latest.remove(&row.id).into_iter().collect();
                row.into_chat(last)
            })
            .collect()
    }

    async fn post_message(&self, chat_id: Uuid, content: &str, author: Author) -> Result<Option<SupportMessage>> {
        let mut tx = self.pool.begin().await?;
        // Never earlier than the chat's last activity, so the log stays ordered.
        let stamped: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "UPDATE support_chats SET updated_at = GREATEST(NOW(), updated_at) WHERE id = $1 RETURNING updated_at",
        )
        .bind(chat_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((created_at,)) = stamped else {
            return Ok(None);
        };
        let message = SupportMessage {
            id: Uuid::now_v7(),
            chat_id,
            content: content.trim().to_string(),
            is_admin: author == Author::Staff,
            created_at,
        };
        sqlx::query("INSERT INTO support_messages (id, chat_id, content, is_admin, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(message.id)
            .bind(message.chat_id)
            .bind(&message.content)
            .bind(message.is_admin)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(message))
    }
}
