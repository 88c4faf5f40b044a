use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SkuMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SkuMappings::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SkuMappings::InternalSku).string().not_null())
                    .col(ColumnDef::new(SkuMappings::SupplierId).uuid().not_null())
                    .col(ColumnDef::new(SkuMappings::SupplierSku).string().not_null())
                    .col(ColumnDef::new(SkuMappings::Cost).decimal().not_null())
                    .col(
                        ColumnDef::new(SkuMappings::IsAvailable)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SkuMappings::StockQuantity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SkuMappings::SyncStatus)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(SkuMappings::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sku_mappings_supplier_id")
                            .from(SkuMappings::Table, SkuMappings::SupplierId)
                            .to(
                                super::m20250301_000001_create_suppliers_table::Suppliers::Table,
                                super::m20250301_000001_create_suppliers_table::Suppliers::Id,
                            ),
                    )
                    .to_owned(),
            )
            .await?;

        // the upsert natural key
        manager
            .create_index(
                Index::create()
                    .name("uq_sku_mappings_internal_sku_supplier_id")
                    .table(SkuMappings::Table)
                    .col(SkuMappings::InternalSku)
                    .col(SkuMappings::SupplierId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SkuMappings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum SkuMappings {
    Table,
    Id,
    InternalSku,
    SupplierId,
    SupplierSku,
    Cost,
    IsAvailable,
    StockQuantity,
    SyncStatus,
    LastSyncedAt,
}
