use crate::{
    entities::commerce::{category, manufacturer, part, part::PartCondition, Category, Manufacturer, Part},
    errors::ServiceError,
    events::{Event, EventSender},
    money::StoreMoney,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_PER_PAGE: u64 = 20;
const MAX_PER_PAGE: u64 = 100;

/// Read side of the parts catalog plus the handful of writes the catalog
/// management collaborator needs (creating records and setting stock).
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Lists active parts, newest first.
    ///
    /// Category and manufacturer filters are given as slugs; an unknown slug
    /// is reported as `NotFound` rather than silently returning nothing.
    #[instrument(skip(self))]
    pub async fn list_parts(
        &self,
        query: PartListQuery,
    ) -> Result<(Vec<PartView>, u64), ServiceError> {
        let mut select = Part::find().filter(part::Column::IsActive.eq(true));

        if let Some(slug) = query.category.as_deref() {
            let category = self.category_by_slug(slug).await?;
            select = select.filter(part::Column::CategoryId.eq(category.id));
        }

        if let Some(slug) = query.manufacturer.as_deref() {
            let manufacturer = Manufacturer::find()
                .filter(manufacturer::Column::Slug.eq(slug))
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Manufacturer {} not found", slug))
                })?;
            select = select.filter(part::Column::ManufacturerId.eq(manufacturer.id));
        }

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(part::Column::Name.contains(search))
                    .add(part::Column::PartNumber.contains(search)),
            );
        }

        let total = select.clone().count(&*self.db).await?;

        let (offset, limit) = query.window();
        let parts = select
            .order_by_desc(part::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&*self.db)
            .await?;

        let views = parts
            .into_iter()
            .map(PartView::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((views, total))
    }

    #[instrument(skip(self))]
    pub async fn get_part(&self, part_id: Uuid) -> Result<part::Model, ServiceError> {
        Part::find_by_id(part_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))
    }

    /// Active part by slug; inactive parts are hidden from the storefront.
    #[instrument(skip(self))]
    pub async fn get_part_by_slug(&self, slug: &str) -> Result<part::Model, ServiceError> {
        Part::find()
            .filter(part::Column::Slug.eq(slug))
            .filter(part::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", slug)))
    }

    pub async fn list_categories(&self) -> Result<Vec<category::Model>, ServiceError> {
        Ok(Category::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn list_manufacturers(&self) -> Result<Vec<manufacturer::Model>, ServiceError> {
        Ok(Manufacturer::find()
            .order_by_asc(manufacturer::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn create_category(
        &self,
        input: CreateCategoryInput,
    ) -> Result<category::Model, ServiceError> {
        input.validate()?;

        if Category::find()
            .filter(category::Column::Slug.eq(&input.slug))
            .one(&*self.db)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "Category slug {} already exists",
                input.slug
            )));
        }

        if let Some(parent_id) = input.parent_id {
            Category::find_by_id(parent_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Parent category {} not found", parent_id))
                })?;
        }

        let category = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(input.slug),
            parent_id: Set(input.parent_id),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        info!(category_id = %category.id, slug = %category.slug, "created category");
        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn create_manufacturer(
        &self,
        input: CreateManufacturerInput,
    ) -> Result<manufacturer::Model, ServiceError> {
        input.validate()?;

        if Manufacturer::find()
            .filter(manufacturer::Column::Slug.eq(&input.slug))
            .one(&*self.db)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "Manufacturer slug {} already exists",
                input.slug
            )));
        }

        let manufacturer = manufacturer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(input.slug),
            logo_url: Set(input.logo_url),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        info!(manufacturer_id = %manufacturer.id, "created manufacturer");
        Ok(manufacturer)
    }

    /// Creates a part priced in the store currency.
    #[instrument(skip(self))]
    pub async fn create_part(&self, input: CreatePartInput) -> Result<part::Model, ServiceError> {
        input.validate()?;

        if input.price.is_negative() {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }

        if Part::find()
            .filter(part::Column::Slug.eq(&input.slug))
            .one(&*self.db)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "Part slug {} already exists",
                input.slug
            )));
        }

        Category::find_by_id(input.category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Category {} not found", input.category_id))
            })?;
        Manufacturer::find_by_id(input.manufacturer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Manufacturer {} not found", input.manufacturer_id))
            })?;

        let now = Utc::now();
        let part = part::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(input.slug),
            description: Set(input.description.unwrap_or_default()),
            price: Set(input.price.amount()),
            currency: Set(input.price.currency_code().to_string()),
            part_number: Set(input.part_number),
            condition: Set(input.condition),
            stock_quantity: Set(input.stock_quantity),
            is_active: Set(input.is_active),
            category_id: Set(input.category_id),
            manufacturer_id: Set(input.manufacturer_id),
            image_url: Set(input.image_url),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(part_id = %part.id, slug = %part.slug, "created part");
        Ok(part)
    }

    /// Overwrites the stock level of a part. Checkout decrements stock on its
    /// own; this is the restocking path.
    #[instrument(skip(self))]
    pub async fn set_stock(&self, part_id: Uuid, quantity: i32) -> Result<part::Model, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Stock quantity cannot be negative".to_string(),
            ));
        }

        let existing = self.get_part(part_id).await?;
        let old_quantity = existing.stock_quantity;

        let mut active: part::ActiveModel = existing.into();
        active.stock_quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::StockAdjusted {
                part_id,
                old_quantity,
                new_quantity: quantity,
            })
            .await;

        info!(%part_id, old_quantity, new_quantity = quantity, "stock level set");
        Ok(updated)
    }

    async fn category_by_slug(&self, slug: &str) -> Result<category::Model, ServiceError> {
        Category::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", slug)))
    }
}

/// Catalog listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Category slug
    pub category: Option<String>,
    /// Manufacturer slug
    pub manufacturer: Option<String>,
    /// Matches name or part number
    pub search: Option<String>,
}

impl PartListQuery {
    /// (offset, limit) for the requested page, one-based.
    pub fn window(&self) -> (u64, u64) {
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        let page = self.page.unwrap_or(1).max(1);
        ((page - 1) * per_page, per_page)
    }
}

/// Storefront view of a part with its currency-tagged price
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PartView {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub part_number: String,
    #[schema(value_type = String)]
    pub condition: PartCondition,
    #[schema(value_type = Object)]
    pub price: StoreMoney,
    pub stock_quantity: i32,
    pub in_stock: bool,
    pub category_id: Uuid,
    pub manufacturer_id: Uuid,
    pub image_url: Option<String>,
}

impl TryFrom<part::Model> for PartView {
    type Error = ServiceError;

    fn try_from(part: part::Model) -> Result<Self, Self::Error> {
        let price = part.unit_price()?;
        Ok(Self {
            id: part.id,
            in_stock: part.is_active && part.stock_quantity > 0,
            name: part.name,
            slug: part.slug,
            description: part.description,
            part_number: part.part_number,
            condition: part.condition,
            price,
            stock_quantity: part.stock_quantity,
            category_id: part.category_id,
            manufacturer_id: part.manufacturer_id,
            image_url: part.image_url,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub slug: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateManufacturerInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub slug: String,
    #[validate(url)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePartInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub slug: String,
    pub description: Option<String>,
    pub price: StoreMoney,
    #[validate(length(min = 1, max = 100))]
    pub part_number: String,
    pub condition: PartCondition,
    #[validate(range(min = 0))]
    pub stock_quantity: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub category_id: Uuid,
    pub manufacturer_id: Uuid,
    pub image_url: Option<String>,
}

fn default_active() -> bool {
    true
}

impl CreatePartInput {
    pub fn new(
        name: impl Into<String>,
        slug: impl Into<String>,
        price: Decimal,
        stock_quantity: i32,
        category_id: Uuid,
        manufacturer_id: Uuid,
    ) -> Self {
        let slug = slug.into();
        Self {
            name: name.into(),
            part_number: slug.to_uppercase(),
            slug,
            description: None,
            price: StoreMoney::new(price),
            condition: PartCondition::New,
            stock_quantity,
            is_active: true,
            category_id,
            manufacturer_id,
            image_url: None,
        }
    }
}
