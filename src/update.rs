use std::marker::PhantomData;

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// Updatable columns for one table. Implementations are closed enums, so the
/// column names reaching the SQL text are known at compile time; only the
/// values are caller-supplied, and those are always bound parameters.
pub trait UpdateColumn: Copy {
    const TABLE: &'static str;

    fn as_sql(self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
pub enum UserColumn {
    Email,
    Username,
}

impl UpdateColumn for UserColumn {
    const TABLE: &'static str = "users";

    fn as_sql(self) -> &'static str {
        match self {
            UserColumn::Email => "email",
            UserColumn::Username => "username",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ProductColumn {
    Name,
    Description,
    Price,
    Stock,
    Category,
    ImageUrl,
}

impl UpdateColumn for ProductColumn {
    const TABLE: &'static str = "products";

    fn as_sql(self) -> &'static str {
        match self {
            ProductColumn::Name => "name",
            ProductColumn::Description => "description",
            ProductColumn::Price => "price",
            ProductColumn::Stock => "stock",
            ProductColumn::Category => "category",
            ProductColumn::ImageUrl => "image_url",
        }
    }
}

/// Accumulates `SET` assignments for the columns a request actually supplied.
/// Untouched columns never appear in the statement, so they keep their stored
/// values. An empty builder must not be executed; callers check `is_empty`
/// and return the current record instead.
pub struct PartialUpdate<'args, C: UpdateColumn> {
    builder: QueryBuilder<'args, Postgres>,
    touched: usize,
    _columns: PhantomData<C>,
}

impl<'args, C: UpdateColumn> PartialUpdate<'args, C> {
    pub fn new() -> Self {
        let mut builder = QueryBuilder::new("UPDATE ");
        builder.push(C::TABLE);
        builder.push(" SET ");
        Self {
            builder,
            touched: 0,
            _columns: PhantomData,
        }
    }

    pub fn set<T>(&mut self, column: C, value: T) -> &mut Self
    where
        T: 'args + sqlx::Encode<'args, Postgres> + sqlx::Type<Postgres>,
    {
        if self.touched > 0 {
            self.builder.push(", ");
        }
        self.builder.push(column.as_sql());
        self.builder.push(" = ");
        self.builder.push_bind(value);
        self.touched += 1;
        self
    }

    pub fn maybe_set<T>(&mut self, column: C, value: Option<T>) -> &mut Self
    where
        T: 'args + sqlx::Encode<'args, Postgres> + sqlx::Type<Postgres>,
    {
        if let Some(value) = value {
            self.set(column, value);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.touched == 0
    }

    /// Finish the statement, scoped to one row and returning it.
    pub fn by_id(mut self, id: Uuid) -> QueryBuilder<'args, Postgres> {
        self.builder.push(" WHERE id = ");
        self.builder.push_bind(id);
        self.builder.push(" RETURNING *");
        self.builder
    }
}

impl<'args, C: UpdateColumn> Default for PartialUpdate<'args, C> {
    fn default() -> Self {
        Self::new()
    }
}
