pub mod account_repository;
pub mod meal_plan_repository;
pub mod mock_db;
pub mod postgres_account_repository;
pub mod postgres_meal_plan_repository;
