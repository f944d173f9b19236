use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ClientDirectory, InvoiceStore};
use crate::core::InvoiceResult;
use crate::models::{
    sequential_invoice_number, Client, ClientUpdate, Invoice, InvoiceItem, InvoiceStatus,
    InvoiceUpdate, InvoiceWithItems, NewClient, NewInvoice, NewInvoiceItem, Profile,
};

/// Almacén en memoria para desarrollo y pruebas.
#[derive(Default)]
pub struct MemoryStore {
    invoices: RwLock<HashMap<String, InvoiceWithItems>>,
    clients: RwLock<Vec<Client>>,
    profile: RwLock<Option<Profile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clients(clients: Vec<Client>) -> Self {
        MemoryStore {
            clients: RwLock::new(clients),
            ..Self::default()
        }
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn create_invoice(
        &self,
        invoice: NewInvoice,
        items: Vec<NewInvoiceItem>,
    ) -> InvoiceResult<Invoice> {
        let mut invoices = self.invoices.write().await;
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let number = match invoice.invoice_number.trim() {
            "" => sequential_invoice_number(now.year(), invoices.len()),
            given => given.to_string(),
        };

        let invoice = Invoice::from_new(id.clone(), number, invoice, now);
        let items = items
            .into_iter()
            .map(|item| InvoiceItem {
                id: Uuid::new_v4().to_string(),
                invoice_id: id.clone(),
                description: item.description,
                quantity: item.quantity,
                rate: item.rate,
                amount: item.amount,
                sort_order: item.sort_order,
            })
            .collect();

        invoices.insert(id, InvoiceWithItems { invoice: invoice.clone(), items });
        Ok(invoice)
    }

    async fn get_invoice(&self, id: &str) -> InvoiceResult<Option<InvoiceWithItems>> {
        Ok(self.invoices.read().await.get(id).cloned())
    }

    async fn list_invoices(&self) -> InvoiceResult<Vec<Invoice>> {
        let mut list: Vec<Invoice> = self
            .invoices
            .read()
            .await
            .values()
            .map(|stored| stored.invoice.clone())
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn set_status(&self, id: &str, status: InvoiceStatus) -> InvoiceResult<Option<Invoice>> {
        let mut invoices = self.invoices.write().await;
        Ok(invoices.get_mut(id).map(|stored| {
            stored.invoice.apply_status(status, Utc::now());
            stored.invoice.clone()
        }))
    }

    async fn update_invoice(
        &self,
        id: &str,
        update: InvoiceUpdate,
    ) -> InvoiceResult<Option<InvoiceWithItems>> {
        let mut invoices = self.invoices.write().await;
        match invoices.get_mut(id) {
            Some(stored) => {
                stored.apply_update(update, Utc::now())?;
                Ok(Some(stored.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_invoice(&self, id: &str) -> InvoiceResult<bool> {
        Ok(self.invoices.write().await.remove(id).is_some())
    }
}

#[async_trait]
impl ClientDirectory for MemoryStore {
    async fn list_clients(&self) -> InvoiceResult<Vec<Client>> {
        let mut clients: Vec<Client> = self
            .clients
            .read()
            .await
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clients)
    }

    async fn get_client(&self, id: &str) -> InvoiceResult<Option<Client>> {
        Ok(self.clients.read().await.iter().find(|c| c.id == id).cloned())
    }

    async fn create_client(&self, client: NewClient) -> InvoiceResult<Client> {
        let client = client.into_client(Uuid::new_v4().to_string(), Utc::now())?;
        self.clients.write().await.push(client.clone());
        Ok(client)
    }

    async fn update_client(&self, id: &str, update: ClientUpdate) -> InvoiceResult<Option<Client>> {
        let mut clients = self.clients.write().await;
        match clients.iter_mut().find(|c| c.id == id) {
            Some(client) => {
                client.apply_update(update)?;
                Ok(Some(client.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_client(&self, id: &str) -> InvoiceResult<bool> {
        let mut clients = self.clients.write().await;
        let before = clients.len();
        clients.retain(|c| c.id != id);
        Ok(clients.len() < before)
    }

    async fn profile(&self) -> InvoiceResult<Option<Profile>> {
        Ok(self.profile.read().await.clone())
    }

    async fn save_profile(&self, profile: Profile) -> InvoiceResult<Profile> {
        profile.validate()?;
        *self.profile.write().await = Some(profile.clone());
        Ok(profile)
    }
}
