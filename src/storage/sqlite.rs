use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ClientDirectory, InvoiceStore};
use crate::core::{InvoiceError, InvoiceResult};
use crate::models::{
    sequential_invoice_number, Client, ClientUpdate, Invoice, InvoiceItem, InvoiceStatus,
    InvoiceUpdate, InvoiceWithItems, NewClient, NewInvoice, NewInvoiceItem, Profile,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        email TEXT PRIMARY KEY,
        full_name TEXT,
        company_name TEXT,
        company_logo TEXT,
        company_address TEXT,
        company_city TEXT,
        company_state TEXT,
        company_zip TEXT,
        company_phone TEXT,
        company_email TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS clients (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT,
        company TEXT,
        address TEXT,
        city TEXT,
        state TEXT,
        zip TEXT,
        country TEXT,
        tax_id TEXT,
        website TEXT,
        notes TEXT,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS invoices (
        id TEXT PRIMARY KEY,
        client_id TEXT,
        client_name TEXT NOT NULL,
        invoice_number TEXT NOT NULL,
        status TEXT NOT NULL,
        template_id TEXT NOT NULL,
        issue_date TEXT NOT NULL,
        due_date TEXT NOT NULL,
        subtotal REAL NOT NULL,
        tax_rate REAL NOT NULL,
        tax_amount REAL NOT NULL,
        discount_rate REAL NOT NULL,
        discount_amount REAL NOT NULL,
        total REAL NOT NULL,
        amount_paid REAL NOT NULL DEFAULT 0,
        amount_due REAL NOT NULL,
        currency TEXT NOT NULL,
        notes TEXT,
        sent_at TEXT,
        paid_at TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS invoice_items (
        id TEXT PRIMARY KEY,
        invoice_id TEXT NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
        description TEXT NOT NULL,
        quantity REAL NOT NULL,
        rate REAL NOT NULL,
        amount REAL NOT NULL,
        sort_order INTEGER NOT NULL
    )
    "#,
];

const INVOICE_COLUMNS: &str = "id, client_id, client_name, invoice_number, status, template_id, \
     issue_date, due_date, subtotal, tax_rate, tax_amount, discount_rate, discount_amount, total, \
     amount_paid, amount_due, currency, notes, sent_at, paid_at, created_at";

// El estado se guarda como texto
#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    client_id: Option<String>,
    client_name: String,
    invoice_number: String,
    status: String,
    template_id: String,
    issue_date: String,
    due_date: String,
    subtotal: f64,
    tax_rate: f64,
    tax_amount: f64,
    discount_rate: f64,
    discount_amount: f64,
    total: f64,
    amount_paid: f64,
    amount_due: f64,
    currency: String,
    notes: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = InvoiceError;

    fn try_from(row: InvoiceRow) -> InvoiceResult<Self> {
        let status = row
            .status
            .parse::<InvoiceStatus>()
            .map_err(InvoiceError::persistence)?;

        Ok(Invoice {
            id: row.id,
            client_id: row.client_id,
            client_name: row.client_name,
            invoice_number: row.invoice_number,
            status,
            template_id: row.template_id,
            issue_date: row.issue_date,
            due_date: row.due_date,
            subtotal: row.subtotal,
            tax_rate: row.tax_rate,
            tax_amount: row.tax_amount,
            discount_rate: row.discount_rate,
            discount_amount: row.discount_amount,
            total: row.total,
            amount_paid: row.amount_paid,
            amount_due: row.amount_due,
            currency: row.currency,
            notes: row.notes,
            sent_at: row.sent_at,
            paid_at: row.paid_at,
            created_at: row.created_at,
        })
    }
}

/// Backend SQLite sobre un pool de sqlx.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> InvoiceResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = SqliteStore { pool };
        store.init_schema().await?;
        info!("Connected to {}", database_url);
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }

    pub async fn init_schema(&self) -> InvoiceResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn insert_client(&self, client: &Client) -> InvoiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, name, email, phone, company, address, city, state, zip,
                                 country, tax_id, website, notes, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.company)
        .bind(&client.address)
        .bind(&client.city)
        .bind(&client.state)
        .bind(&client.zip)
        .bind(&client.country)
        .bind(&client.tax_id)
        .bind(&client.website)
        .bind(&client.notes)
        .bind(client.is_active)
        .bind(client.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_invoice(&self, id: &str) -> InvoiceResult<Option<Invoice>> {
        let row: Option<InvoiceRow> =
            sqlx::query_as(&format!("SELECT {} FROM invoices WHERE id = ?1", INVOICE_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Invoice::try_from).transpose()
    }
}

#[async_trait]
impl InvoiceStore for SqliteStore {
    async fn create_invoice(
        &self,
        invoice: NewInvoice,
        items: Vec<NewInvoiceItem>,
    ) -> InvoiceResult<Invoice> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let number = match invoice.invoice_number.trim() {
            "" => {
                let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
                    .fetch_one(&mut *tx)
                    .await?;
                sequential_invoice_number(now.year(), count.max(0) as usize)
            }
            given => given.to_string(),
        };
        let invoice = Invoice::from_new(id.clone(), number, invoice, now);

        sqlx::query(&format!(
            "INSERT INTO invoices ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, \
             ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            INVOICE_COLUMNS
        ))
        .bind(&invoice.id)
        .bind(&invoice.client_id)
        .bind(&invoice.client_name)
        .bind(&invoice.invoice_number)
        .bind(invoice.status.as_str())
        .bind(&invoice.template_id)
        .bind(&invoice.issue_date)
        .bind(&invoice.due_date)
        .bind(invoice.subtotal)
        .bind(invoice.tax_rate)
        .bind(invoice.tax_amount)
        .bind(invoice.discount_rate)
        .bind(invoice.discount_amount)
        .bind(invoice.total)
        .bind(invoice.amount_paid)
        .bind(invoice.amount_due)
        .bind(&invoice.currency)
        .bind(&invoice.notes)
        .bind(invoice.sent_at)
        .bind(invoice.paid_at)
        .bind(invoice.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (id, invoice_id, description, quantity, rate, amount, sort_order)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&invoice.id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.rate)
            .bind(item.amount)
            .bind(item.sort_order)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Stored invoice {} with {} items", invoice.invoice_number, items.len());
        Ok(invoice)
    }

    async fn get_invoice(&self, id: &str) -> InvoiceResult<Option<InvoiceWithItems>> {
        let invoice = match self.fetch_invoice(id).await? {
            Some(invoice) => invoice,
            None => return Ok(None),
        };

        let items: Vec<InvoiceItem> = sqlx::query_as(
            r#"
            SELECT id, invoice_id, description, quantity, rate, amount, sort_order
            FROM invoice_items
            WHERE invoice_id = ?1
            ORDER BY sort_order
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(InvoiceWithItems { invoice, items }))
    }

    async fn list_invoices(&self) -> InvoiceResult<Vec<Invoice>> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoices ORDER BY created_at DESC",
            INVOICE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Invoice::try_from).collect()
    }

    async fn set_status(&self, id: &str, status: InvoiceStatus) -> InvoiceResult<Option<Invoice>> {
        let mut invoice = match self.fetch_invoice(id).await? {
            Some(invoice) => invoice,
            None => return Ok(None),
        };
        invoice.apply_status(status, Utc::now());

        sqlx::query(
            r#"
            UPDATE invoices
            SET status = ?2, sent_at = ?3, paid_at = ?4, amount_paid = ?5, amount_due = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(invoice.status.as_str())
        .bind(invoice.sent_at)
        .bind(invoice.paid_at)
        .bind(invoice.amount_paid)
        .bind(invoice.amount_due)
        .execute(&self.pool)
        .await?;

        Ok(Some(invoice))
    }

    async fn update_invoice(
        &self,
        id: &str,
        update: InvoiceUpdate,
    ) -> InvoiceResult<Option<InvoiceWithItems>> {
        let mut stored = match self.get_invoice(id).await? {
            Some(stored) => stored,
            None => return Ok(None),
        };
        let items_replaced = update.items.is_some();
        stored.apply_update(update, Utc::now())?;

        let invoice = &stored.invoice;
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE invoices
            SET client_name = ?2, invoice_number = ?3, status = ?4, template_id = ?5,
                issue_date = ?6, due_date = ?7, subtotal = ?8, tax_rate = ?9, tax_amount = ?10,
                discount_rate = ?11, discount_amount = ?12, total = ?13, amount_paid = ?14,
                amount_due = ?15, currency = ?16, notes = ?17, sent_at = ?18, paid_at = ?19
            WHERE id = ?1
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.client_name)
        .bind(&invoice.invoice_number)
        .bind(invoice.status.as_str())
        .bind(&invoice.template_id)
        .bind(&invoice.issue_date)
        .bind(&invoice.due_date)
        .bind(invoice.subtotal)
        .bind(invoice.tax_rate)
        .bind(invoice.tax_amount)
        .bind(invoice.discount_rate)
        .bind(invoice.discount_amount)
        .bind(invoice.total)
        .bind(invoice.amount_paid)
        .bind(invoice.amount_due)
        .bind(&invoice.currency)
        .bind(&invoice.notes)
        .bind(invoice.sent_at)
        .bind(invoice.paid_at)
        .execute(&mut *tx)
        .await?;

        if items_replaced {
            sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for item in &stored.items {
                sqlx::query(
                    r#"
                    INSERT INTO invoice_items (id, invoice_id, description, quantity, rate, amount, sort_order)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                )
                .bind(&item.id)
                .bind(&item.invoice_id)
                .bind(&item.description)
                .bind(item.quantity)
                .bind(item.rate)
                .bind(item.amount)
                .bind(item.sort_order)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        debug!("Updated invoice {}", stored.invoice.invoice_number);
        Ok(Some(stored))
    }

    async fn delete_invoice(&self, id: &str) -> InvoiceResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[async_trait]
impl ClientDirectory for SqliteStore {
    async fn list_clients(&self) -> InvoiceResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(clients)
    }

    async fn get_client(&self, id: &str) -> InvoiceResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    async fn create_client(&self, client: NewClient) -> InvoiceResult<Client> {
        let client = client.into_client(Uuid::new_v4().to_string(), Utc::now())?;
        self.insert_client(&client).await?;
        info!("Created client {}", client.id);
        Ok(client)
    }

    async fn update_client(&self, id: &str, update: ClientUpdate) -> InvoiceResult<Option<Client>> {
        let mut client = match self.get_client(id).await? {
            Some(client) => client,
            None => return Ok(None),
        };
        client.apply_update(update)?;

        sqlx::query(
            r#"
            UPDATE clients
            SET name = ?2, email = ?3, phone = ?4, company = ?5, address = ?6, city = ?7,
                state = ?8, zip = ?9, country = ?10, tax_id = ?11, website = ?12, notes = ?13,
                is_active = ?14
            WHERE id = ?1
            "#,
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.company)
        .bind(&client.address)
        .bind(&client.city)
        .bind(&client.state)
        .bind(&client.zip)
        .bind(&client.country)
        .bind(&client.tax_id)
        .bind(&client.website)
        .bind(&client.notes)
        .bind(client.is_active)
        .execute(&self.pool)
        .await?;

        Ok(Some(client))
    }

    async fn delete_client(&self, id: &str) -> InvoiceResult<bool> {
        let result = sqlx::query("DELETE FROM clients WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn profile(&self) -> InvoiceResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn save_profile(&self, profile: Profile) -> InvoiceResult<Profile> {
        profile.validate()?;

        // una sola cuenta: el perfil nuevo reemplaza al anterior
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM profiles").execute(&mut *tx).await?;
        sqlx::query(
            r#"
            INSERT INTO profiles (email, full_name, company_name, company_logo, company_address,
                                  company_city, company_state, company_zip, company_phone,
                                  company_email)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(&profile.company_name)
        .bind(&profile.company_logo)
        .bind(&profile.company_address)
        .bind(&profile.company_city)
        .bind(&profile.company_state)
        .bind(&profile.company_zip)
        .bind(&profile.company_phone)
        .bind(&profile.company_email)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(profile)
    }
}
