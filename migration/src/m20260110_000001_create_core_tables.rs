use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Enum types
        manager
            .create_type(
                Type::create()
                    .as_enum(UserRole::Enum)
                    .values([
                        UserRole::Student,
                        UserRole::Company,
                        UserRole::Admin,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(PlanTier::Enum)
                    .values([PlanTier::Free, PlanTier::Basic, PlanTier::Premium])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(TransactionStatus::Enum)
                    .values([
                        TransactionStatus::Pending,
                        TransactionStatus::Completed,
                        TransactionStatus::Failed,
                        TransactionStatus::Cancelled,
                        TransactionStatus::Refunded,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(ApplicationStatus::Enum)
                    .values([
                        ApplicationStatus::Submitted,
                        ApplicationStatus::Reviewed,
                        ApplicationStatus::Accepted,
                        ApplicationStatus::Rejected,
                    ])
                    .to_owned(),
            )
            .await?;

        // users
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(
                        ColumnDef::new(Users::Role)
                            .custom(UserRole::Enum)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Users::FullName).string().null())
                    .col(
                        ColumnDef::new(Users::IsVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Users::VerificationToken).uuid().null())
                    .col(ColumnDef::new(Users::ResetToken).uuid().null())
                    .col(
                        ColumnDef::new(Users::ResetTokenExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_email")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // jobs
        manager
            .create_table(
                Table::create()
                    .table(Jobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Jobs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Jobs::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Jobs::Title).string().not_null())
                    .col(ColumnDef::new(Jobs::Description).text().not_null())
                    .col(ColumnDef::new(Jobs::Location).string().null())
                    .col(ColumnDef::new(Jobs::EmploymentType).string().null())
                    .col(
                        ColumnDef::new(Jobs::IsOpen)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Jobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Jobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_jobs_company_id")
                            .from(Jobs::Table, Jobs::CompanyId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // applications
        manager
            .create_table(
                Table::create()
                    .table(Applications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Applications::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Applications::JobId).uuid().not_null())
                    .col(ColumnDef::new(Applications::StudentId).uuid().not_null())
                    .col(ColumnDef::new(Applications::ResumeUrl).string().not_null())
                    .col(ColumnDef::new(Applications::CoverLetter).text().null())
                    .col(
                        ColumnDef::new(Applications::Status)
                            .custom(ApplicationStatus::Enum)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Applications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Applications::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_applications_job_id")
                            .from(Applications::Table, Applications::JobId)
                            .to(Jobs::Table, Jobs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_applications_student_id")
                            .from(Applications::Table, Applications::StudentId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One application per (job, student)
        manager
            .create_index(
                Index::create()
                    .name("idx_applications_job_student")
                    .table(Applications::Table)
                    .col(Applications::JobId)
                    .col(Applications::StudentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // transactions
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(Transactions::ProviderTranId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Amount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Currency).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::Plan)
                            .custom(PlanTier::Enum)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Status)
                            .custom(TransactionStatus::Enum)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::TransactionDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::NextBillingDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Transactions::AutoRenew).boolean().null())
                    .col(
                        ColumnDef::new(Transactions::ProviderMetadata)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_user_id")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_provider_tran_id")
                    .table(Transactions::Table)
                    .col(Transactions::ProviderTranId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_user_status")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::Status)
                    .to_owned(),
            )
            .await?;

        // usage_counters
        manager
            .create_table(
                Table::create()
                    .table(UsageCounters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UsageCounters::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UsageCounters::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(UsageCounters::FeatureKey)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UsageCounters::Period).date().not_null())
                    .col(
                        ColumnDef::new(UsageCounters::Count)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UsageCounters::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageCounters::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_usage_counters_user_id")
                            .from(UsageCounters::Table, UsageCounters::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_usage_counters_user_feature_period")
                    .table(UsageCounters::Table)
                    .col(UsageCounters::UserId)
                    .col(UsageCounters::FeatureKey)
                    .col(UsageCounters::Period)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UsageCounters::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Applications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(ApplicationStatus::Enum).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(TransactionStatus::Enum).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(PlanTier::Enum).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(UserRole::Enum).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum UserRole {
    #[sea_orm(iden = "user_role")]
    Enum,
    Student,
    Company,
    Admin,
}

#[derive(DeriveIden)]
enum PlanTier {
    #[sea_orm(iden = "plan_tier")]
    Enum,
    Free,
    Basic,
    Premium,
}

#[derive(DeriveIden)]
enum TransactionStatus {
    #[sea_orm(iden = "transaction_status")]
    Enum,
    Pending,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

#[derive(DeriveIden)]
enum ApplicationStatus {
    #[sea_orm(iden = "application_status")]
    Enum,
    Submitted,
    Reviewed,
    Accepted,
    Rejected,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    Role,
    FullName,
    IsVerified,
    VerificationToken,
    ResetToken,
    ResetTokenExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Jobs {
    Table,
    Id,
    CompanyId,
    Title,
    Description,
    Location,
    EmploymentType,
    IsOpen,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Applications {
    Table,
    Id,
    JobId,
    StudentId,
    ResumeUrl,
    CoverLetter,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    UserId,
    ProviderTranId,
    Amount,
    Currency,
    Plan,
    Status,
    TransactionDate,
    ExpiresAt,
    NextBillingDate,
    AutoRenew,
    ProviderMetadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UsageCounters {
    Table,
    Id,
    UserId,
    FeatureKey,
    Period,
    Count,
    CreatedAt,
    UpdatedAt,
}
