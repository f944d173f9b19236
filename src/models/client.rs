use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{join_address, LogoImage};
use crate::core::{InvoiceError, InvoiceResult};

pub const MISSING_CLIENT_NAME: &str = "Client name is required";
pub const MISSING_CLIENT_EMAIL: &str = "Email is required";

/// Cliente guardado en el directorio (fila de la tabla `clients`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub tax_id: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Client {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            phone: None,
            company: None,
            address: None,
            city: None,
            state: None,
            zip: None,
            country: None,
            tax_id: None,
            website: None,
            notes: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Dirección en una línea: calle, ciudad, estado, código postal, país.
    pub fn full_address(&self) -> String {
        join_address([
            self.address.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.zip.as_deref(),
            self.country.as_deref(),
        ])
    }
}

/// Alta de un cliente (POST /clients).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NewClient {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub tax_id: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

impl NewClient {
    pub fn validate(&self) -> InvoiceResult<()> {
        if self.name.trim().is_empty() {
            return Err(InvoiceError::validation(MISSING_CLIENT_NAME));
        }
        if self.email.trim().is_empty() {
            return Err(InvoiceError::validation(MISSING_CLIENT_EMAIL));
        }
        Ok(())
    }

    /// Valida y construye la fila con `id` asignado por el almacén.
    pub fn into_client(self, id: String, now: DateTime<Utc>) -> InvoiceResult<Client> {
        self.validate()?;
        Ok(Client {
            id,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: optional(self.phone),
            company: optional(self.company),
            address: optional(self.address),
            city: optional(self.city),
            state: optional(self.state),
            zip: optional(self.zip),
            country: optional(self.country),
            tax_id: optional(self.tax_id),
            website: optional(self.website),
            notes: optional(self.notes),
            is_active: true,
            created_at: now,
        })
    }
}

/// Cambios parciales de un cliente (PUT /clients/{id}). `Some("")` borra un campo opcional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub tax_id: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

impl Client {
    /// Aplica el cambio completo o nada: nombre y email no pueden quedar vacíos.
    pub fn apply_update(&mut self, update: ClientUpdate) -> InvoiceResult<()> {
        if matches!(&update.name, Some(name) if name.trim().is_empty()) {
            return Err(InvoiceError::validation(MISSING_CLIENT_NAME));
        }
        if matches!(&update.email, Some(email) if email.trim().is_empty()) {
            return Err(InvoiceError::validation(MISSING_CLIENT_EMAIL));
        }

        if let Some(v) = update.name {
            self.name = v.trim().to_string();
        }
        if let Some(v) = update.email {
            self.email = v.trim().to_string();
        }
        for (field, value) in [
            (&mut self.phone, update.phone),
            (&mut self.company, update.company),
            (&mut self.address, update.address),
            (&mut self.city, update.city),
            (&mut self.state, update.state),
            (&mut self.zip, update.zip),
            (&mut self.country, update.country),
            (&mut self.tax_id, update.tax_id),
            (&mut self.website, update.website),
            (&mut self.notes, update.notes),
        ] {
            if value.is_some() {
                *field = optional(value);
            }
        }
        if let Some(v) = update.is_active {
            self.is_active = v;
        }
        Ok(())
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Perfil del emisor, usado para precargar el bloque "From" del borrador.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub email: String,
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub company_logo: Option<String>,
    pub company_address: Option<String>,
    pub company_city: Option<String>,
    pub company_state: Option<String>,
    pub company_zip: Option<String>,
    pub company_phone: Option<String>,
    pub company_email: Option<String>,
}

impl Profile {
    /// El logo, si viene, tiene que ser una imagen en data URL.
    pub fn validate(&self) -> InvoiceResult<()> {
        if let Some(logo) = self.company_logo.as_deref().filter(|l| !l.trim().is_empty()) {
            LogoImage::from_data_url(logo.trim())?;
        }
        Ok(())
    }

    pub fn company_address_line(&self) -> String {
        join_address([
            self.company_address.as_deref(),
            self.company_city.as_deref(),
            self.company_state.as_deref(),
            self.company_zip.as_deref(),
        ])
    }
}
