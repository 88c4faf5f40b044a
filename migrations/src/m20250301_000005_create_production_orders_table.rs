use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProductionOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductionOrders::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductionOrders::OrderId).uuid().not_null())
                    .col(
                        ColumnDef::new(ProductionOrders::OrderNumber)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductionOrders::SupplierId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductionOrders::SupplierName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductionOrders::Items)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductionOrders::EstimatedCost)
                            .decimal()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductionOrders::ActualCost).decimal().null())
                    .col(
                        ColumnDef::new(ProductionOrders::CostVariance)
                            .decimal()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ProductionOrders::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductionOrders::StatusHistory)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductionOrders::QcChecks)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductionOrders::SupplierOrderId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ProductionOrders::OrderedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductionOrders::ExpectedCompletionDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ProductionOrders::ActualCompletionDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ProductionOrders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductionOrders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_production_orders_order_id")
                            .from(ProductionOrders::Table, ProductionOrders::OrderId)
                            .to(
                                super::m20250301_000002_create_orders_table::Orders::Table,
                                super::m20250301_000002_create_orders_table::Orders::Id,
                            ),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_production_orders_supplier_id")
                            .from(ProductionOrders::Table, ProductionOrders::SupplierId)
                            .to(
                                super::m20250301_000001_create_suppliers_table::Suppliers::Table,
                                super::m20250301_000001_create_suppliers_table::Suppliers::Id,
                            ),
                    )
                    .to_owned(),
            )
            .await?;

        // resume lookups are by (order, supplier)
        manager
            .create_index(
                Index::create()
                    .name("idx_production_orders_order_id_supplier_id")
                    .table(ProductionOrders::Table)
                    .col(ProductionOrders::OrderId)
                    .col(ProductionOrders::SupplierId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_production_orders_status")
                    .table(ProductionOrders::Table)
                    .col(ProductionOrders::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProductionOrders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ProductionOrders {
    Table,
    Id,
    OrderId,
    OrderNumber,
    SupplierId,
    SupplierName,
    Items,
    EstimatedCost,
    CostVariance,
    ActualCost,
    Status,
    StatusHistory,
    QcChecks,
    SupplierOrderId,
    OrderedAt,
    ExpectedCompletionDate,
    ActualCompletionDate,
    CreatedAt,
    UpdatedAt,
}
