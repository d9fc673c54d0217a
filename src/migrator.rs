use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_catalog_tables::Migration),
            Box::new(m20250101_000002_create_cart_tables::Migration),
            Box::new(m20250101_000003_create_order_tables::Migration),
            Box::new(m20250101_000004_create_payment_tables::Migration),
            Box::new(m20250101_000005_create_shipping_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_catalog_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Categories::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Categories::Name).string_len(255).not_null())
                        .col(
                            ColumnDef::new(Categories::Slug)
                                .string_len(255)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Categories::ParentId).uuid().null())
                        .col(
                            ColumnDef::new(Categories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_categories_parent_id")
                                .from(Categories::Table, Categories::ParentId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Manufacturers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Manufacturers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Manufacturers::Name).string_len(255).not_null())
                        .col(
                            ColumnDef::new(Manufacturers::Slug)
                                .string_len(255)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Manufacturers::LogoUrl).string().null())
                        .col(
                            ColumnDef::new(Manufacturers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Parts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Parts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Parts::Name).string_len(255).not_null())
                        .col(
                            ColumnDef::new(Parts::Slug)
                                .string_len(255)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Parts::Description).text().not_null())
                        .col(ColumnDef::new(Parts::Price).decimal_len(10, 2).not_null())
                        .col(ColumnDef::new(Parts::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(Parts::PartNumber).string_len(20).not_null())
                        .col(ColumnDef::new(Parts::Condition).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Parts::StockQuantity)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(Parts::StockQuantity).gte(0)),
                        )
                        .col(
                            ColumnDef::new(Parts::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Parts::CategoryId).uuid().not_null())
                        .col(ColumnDef::new(Parts::ManufacturerId).uuid().not_null())
                        .col(ColumnDef::new(Parts::ImageUrl).string().null())
                        .col(
                            ColumnDef::new(Parts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Parts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_parts_category_id")
                                .from(Parts::Table, Parts::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_parts_manufacturer_id")
                                .from(Parts::Table, Parts::ManufacturerId)
                                .to(Manufacturers::Table, Manufacturers::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_parts_category_id")
                        .table(Parts::Table)
                        .col(Parts::CategoryId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_parts_manufacturer_id")
                        .table(Parts::Table)
                        .col(Parts::ManufacturerId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Parts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Manufacturers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Categories {
        Table,
        Id,
        Name,
        Slug,
        ParentId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Manufacturers {
        Table,
        Id,
        Name,
        Slug,
        LogoUrl,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Parts {
        Table,
        Id,
        Name,
        Slug,
        Description,
        Price,
        Currency,
        PartNumber,
        Condition,
        StockQuantity,
        IsActive,
        CategoryId,
        ManufacturerId,
        ImageUrl,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_cart_tables {

    use super::m20250101_000001_create_catalog_tables::Parts;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_cart_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Carts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Carts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Carts::UserId).uuid().null().unique_key())
                        .col(
                            ColumnDef::new(Carts::SessionKey)
                                .string_len(64)
                                .null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Carts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Carts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CartItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(CartItems::CartId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::PartId).uuid().not_null())
                        .col(
                            ColumnDef::new(CartItems::Quantity)
                                .integer()
                                .not_null()
                                .check(Expr::col(CartItems::Quantity).gt(0)),
                        )
                        .col(
                            ColumnDef::new(CartItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_items_cart_id")
                                .from(CartItems::Table, CartItems::CartId)
                                .to(Carts::Table, Carts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_items_part_id")
                                .from(CartItems::Table, CartItems::PartId)
                                .to(Parts::Table, Parts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_cart_items_cart_part")
                        .table(CartItems::Table)
                        .col(CartItems::CartId)
                        .col(CartItems::PartId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CustomerProfiles::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CustomerProfiles::UserId)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CustomerProfiles::Email).string_len(254).null())
                        .col(ColumnDef::new(CustomerProfiles::Address).text().not_null())
                        .col(ColumnDef::new(CustomerProfiles::City).string_len(100).not_null())
                        .col(ColumnDef::new(CustomerProfiles::State).string_len(100).not_null())
                        .col(
                            ColumnDef::new(CustomerProfiles::PostalCode)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(CustomerProfiles::Phone).string_len(20).not_null())
                        .col(
                            ColumnDef::new(CustomerProfiles::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CustomerProfiles::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CartItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Carts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Carts {
        Table,
        Id,
        UserId,
        SessionKey,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum CartItems {
        Table,
        Id,
        CartId,
        PartId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum CustomerProfiles {
        Table,
        UserId,
        Email,
        Address,
        City,
        State,
        PostalCode,
        Phone,
        UpdatedAt,
    }
}

mod m20250101_000003_create_order_tables {

    use super::m20250101_000001_create_catalog_tables::Parts;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string_len(20)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::UserId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Status).string_len(20).not_null())
                        .col(ColumnDef::new(Orders::PaymentStatus).string_len(20).not_null())
                        .col(ColumnDef::new(Orders::PaymentMethod).string_len(20).not_null())
                        .col(ColumnDef::new(Orders::Subtotal).decimal_len(10, 2).not_null())
                        .col(
                            ColumnDef::new(Orders::ShippingAmount)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::TotalAmount).decimal_len(10, 2).not_null())
                        .col(ColumnDef::new(Orders::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(Orders::ShippingMethodId).uuid().null())
                        .col(ColumnDef::new(Orders::ContactEmail).string_len(254).null())
                        .col(
                            ColumnDef::new(Orders::ShippingFirstName)
                                .string_len(50)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::ShippingLastName)
                                .string_len(50)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::ShippingAddress).text().not_null())
                        .col(ColumnDef::new(Orders::ShippingCity).string_len(100).not_null())
                        .col(ColumnDef::new(Orders::ShippingState).string_len(100).not_null())
                        .col(
                            ColumnDef::new(Orders::ShippingPostalCode)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::ShippingPhone).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_user_created")
                        .table(Orders::Table)
                        .col(Orders::UserId)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::PartId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::PartName).string_len(255).not_null())
                        .col(
                            ColumnDef::new(OrderItems::Quantity)
                                .integer()
                                .not_null()
                                .check(Expr::col(OrderItems::Quantity).gt(0)),
                        )
                        .col(ColumnDef::new(OrderItems::UnitPrice).decimal_len(10, 2).not_null())
                        .col(
                            ColumnDef::new(OrderItems::TotalPrice)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_part_id")
                                .from(OrderItems::Table, OrderItems::PartId)
                                .to(Parts::Table, Parts::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Orders {
        Table,
        Id,
        OrderNumber,
        UserId,
        Status,
        PaymentStatus,
        PaymentMethod,
        Subtotal,
        ShippingAmount,
        TotalAmount,
        Currency,
        ShippingMethodId,
        ContactEmail,
        ShippingFirstName,
        ShippingLastName,
        ShippingAddress,
        ShippingCity,
        ShippingState,
        ShippingPostalCode,
        ShippingPhone,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        PartId,
        PartName,
        Quantity,
        UnitPrice,
        TotalPrice,
    }
}

mod m20250101_000004_create_payment_tables {

    use super::m20250101_000003_create_order_tables::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_payment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(Payments::Reference)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Payments::Amount).decimal_len(10, 2).not_null())
                        .col(ColumnDef::new(Payments::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(Payments::PaymentMethod).string_len(20).not_null())
                        .col(ColumnDef::new(Payments::Status).string_len(20).not_null())
                        .col(ColumnDef::new(Payments::GatewayResponse).json().null())
                        .col(ColumnDef::new(Payments::TransactionId).string_len(100).null())
                        .col(
                            ColumnDef::new(Payments::PaidAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Payments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Payments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payments_order_id")
                                .from(Payments::Table, Payments::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_order_id")
                        .table(Payments::Table)
                        .col(Payments::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BankAccounts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BankAccounts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BankAccounts::BankName).string_len(100).not_null())
                        .col(
                            ColumnDef::new(BankAccounts::AccountName)
                                .string_len(200)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BankAccounts::AccountNumber)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(BankAccounts::SortCode).string_len(20).null())
                        .col(
                            ColumnDef::new(BankAccounts::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(BankAccounts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BankAccounts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BankAccounts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Payments {
        Table,
        Id,
        OrderId,
        Reference,
        Amount,
        Currency,
        PaymentMethod,
        Status,
        GatewayResponse,
        TransactionId,
        PaidAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BankAccounts {
        Table,
        Id,
        BankName,
        AccountName,
        AccountNumber,
        SortCode,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000005_create_shipping_tables {

    use super::m20250101_000003_create_order_tables::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_shipping_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ShippingMethods::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShippingMethods::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShippingMethods::Name).string_len(100).not_null())
                        .col(ColumnDef::new(ShippingMethods::Description).text().not_null())
                        .col(
                            ColumnDef::new(ShippingMethods::BaseCost)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShippingMethods::Currency).string_len(3).not_null())
                        .col(
                            ColumnDef::new(ShippingMethods::EstimatedDaysMin)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingMethods::EstimatedDaysMax)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingMethods::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ShippingMethods::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingMethods::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Shipments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Shipments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Shipments::OrderId).uuid().not_null().unique_key())
                        .col(
                            ColumnDef::new(Shipments::TrackingNumber)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Shipments::ShippingMethodId).uuid().null())
                        .col(ColumnDef::new(Shipments::Status).string_len(20).not_null())
                        .col(ColumnDef::new(Shipments::Carrier).string_len(100).null())
                        .col(ColumnDef::new(Shipments::EstimatedDeliveryDate).date().null())
                        .col(ColumnDef::new(Shipments::ActualDeliveryDate).date().null())
                        .col(ColumnDef::new(Shipments::Notes).text().null())
                        .col(
                            ColumnDef::new(Shipments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipments_order_id")
                                .from(Shipments::Table, Shipments::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipments_shipping_method_id")
                                .from(Shipments::Table, Shipments::ShippingMethodId)
                                .to(ShippingMethods::Table, ShippingMethods::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShipmentTracking::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentTracking::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentTracking::ShipmentId).uuid().not_null())
                        .col(ColumnDef::new(ShipmentTracking::Status).string_len(100).not_null())
                        .col(
                            ColumnDef::new(ShipmentTracking::Location)
                                .string_len(200)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentTracking::Description).text().not_null())
                        .col(
                            ColumnDef::new(ShipmentTracking::Timestamp)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_tracking_shipment_id")
                                .from(ShipmentTracking::Table, ShipmentTracking::ShipmentId)
                                .to(Shipments::Table, Shipments::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_tracking_shipment_ts")
                        .table(ShipmentTracking::Table)
                        .col(ShipmentTracking::ShipmentId)
                        .col(ShipmentTracking::Timestamp)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShipmentTracking::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Shipments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ShippingMethods::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ShippingMethods {
        Table,
        Id,
        Name,
        Description,
        BaseCost,
        Currency,
        EstimatedDaysMin,
        EstimatedDaysMax,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Shipments {
        Table,
        Id,
        OrderId,
        TrackingNumber,
        ShippingMethodId,
        Status,
        Carrier,
        EstimatedDeliveryDate,
        ActualDeliveryDate,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ShipmentTracking {
        Table,
        Id,
        ShipmentId,
        Status,
        Location,
        Description,
        Timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;

    #[tokio::test]
    async fn migrations_apply_and_roll_back_cleanly() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let manager = SchemaManager::new(&db);
        for table in ["parts", "carts", "orders", "payments", "shipments", "shipment_tracking"] {
            assert!(manager.has_table(table).await.unwrap(), "missing table {}", table);
        }

        Migrator::down(&db, None).await.unwrap();
        assert!(!manager.has_table("orders").await.unwrap());
    }
}
