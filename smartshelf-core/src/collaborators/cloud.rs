//! Cloud REST adapter with local cache fallback
//!
//! Every successful fetch rewrites its cache file in the data folder
//! (`products.json`, `rfids.json`, `combo.json`, `slideshow_images.json`);
//! when the cloud is unreachable or not configured the cache is served
//! instead. Order and audit posts have no fallback: a failure is returned
//! to the caller, which logs it.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{CatalogProvider, Order, OrderSink, RestockAudit};
use crate::catalog::{Catalog, Product};
use crate::config::CloudConfig;
use crate::error::{Error, Result};

const USER_AGENT: &str = concat!("smartshelf/", env!("CARGO_PKG_VERSION"));

pub const PRODUCTS_CACHE: &str = "products.json";
pub const BADGES_CACHE: &str = "rfids.json";
pub const COMBOS_CACHE: &str = "combo.json";
pub const POSTERS_CACHE: &str = "slideshow_images.json";

#[derive(Debug, Deserialize)]
struct ProductsResponse {
    products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct BadgeUser {
    rfid: String,
}

#[derive(Debug, Deserialize)]
struct BadgesResponse {
    users: Vec<BadgeUser>,
}

#[derive(Debug, Deserialize)]
struct DataResponse {
    data: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Poster {
    image_url: String,
}

/// Cloud client for catalogs, orders and restock history
pub struct CloudClient {
    http_client: reqwest::Client,
    config: CloudConfig,
    cache_dir: PathBuf,
}

impl CloudClient {
    pub fn new(config: CloudConfig, cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http_client,
            config,
            cache_dir: cache_dir.into(),
        })
    }

    /// Products from the local cache only (boot)
    pub fn cached_catalog(&self) -> Catalog {
        read_cache::<Vec<Product>>(&self.cache_dir, PRODUCTS_CACHE)
            .map(Catalog::new)
            .unwrap_or_else(|e| {
                warn!("No cached products: {}", e);
                Catalog::default()
            })
    }

    /// Badge ids from the local cache only (boot)
    pub fn cached_badges(&self) -> Vec<String> {
        read_cache::<Vec<String>>(&self.cache_dir, BADGES_CACHE).unwrap_or_else(|e| {
            warn!("No cached badge list: {}", e);
            Vec::new()
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str, name: &'static str) -> Result<T> {
        if url.is_empty() {
            return Err(Error::EndpointMissing(name));
        }
        debug!("Fetching {} from {}", name, url);
        let response = self
            .http_client
            .get(url)
            .timeout(self.config.fetch_timeout())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::CloudStatus {
                endpoint: name.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json::<T>().await?)
    }

    async fn post<T: Serialize + Sync>(&self, url: &str, name: &'static str, body: &T) -> Result<()> {
        if url.is_empty() {
            return Err(Error::EndpointMissing(name));
        }
        let response = self
            .http_client
            .post(url)
            .timeout(self.config.post_timeout())
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::CloudStatus {
                endpoint: name.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn refresh_combos(&self) -> Result<()> {
        let response: DataResponse = self.fetch(&self.config.combos_url, "combos").await?;
        write_cache(&self.cache_dir, COMBOS_CACHE, &response.data).await?;
        info!("Cached {} combos", response.data.len());
        Ok(())
    }

    async fn refresh_posters(&self) -> Result<()> {
        let response: DataResponse = self.fetch(&self.config.posters_url, "posters").await?;
        let posters: Vec<Poster> = response
            .data
            .iter()
            .map(|p| Poster {
                image_url: p
                    .get("image_url")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect();
        write_cache(&self.cache_dir, POSTERS_CACHE, &posters).await?;
        info!("Cached {} posters", posters.len());
        Ok(())
    }
}

#[async_trait]
impl CatalogProvider for CloudClient {
    async fn products(&self) -> Result<Catalog> {
        match self.fetch::<ProductsResponse>(&self.config.products_url, "products").await {
            Ok(response) => {
                let products = with_image_prefix(response.products, &self.config.image_prefix);
                if let Err(e) = write_cache(&self.cache_dir, PRODUCTS_CACHE, &products).await {
                    warn!("Failed to cache products: {}", e);
                }
                info!("Loaded {} products from cloud", products.len());
                Ok(Catalog::new(products))
            }
            Err(e) => {
                warn!("Products unavailable from cloud ({}), using cache", e);
                Ok(Catalog::new(read_cache(&self.cache_dir, PRODUCTS_CACHE)?))
            }
        }
    }

    async fn badge_allow_list(&self) -> Result<Vec<String>> {
        match self.fetch::<BadgesResponse>(&self.config.badges_url, "badges").await {
            Ok(response) => {
                let badges: Vec<String> = response.users.into_iter().map(|u| u.rfid).collect();
                if let Err(e) = write_cache(&self.cache_dir, BADGES_CACHE, &badges).await {
                    warn!("Failed to cache badge list: {}", e);
                }
                info!("Loaded {} badges from cloud", badges.len());
                Ok(badges)
            }
            Err(e) => {
                warn!("Badge list unavailable from cloud ({}), using cache", e);
                read_cache(&self.cache_dir, BADGES_CACHE)
            }
        }
    }

    async fn refresh_auxiliary(&self) -> Result<()> {
        let (combos, posters) = tokio::join!(self.refresh_combos(), self.refresh_posters());
        if let Err(e) = &combos {
            warn!("Combos not refreshed: {}", e);
        }
        if let Err(e) = &posters {
            warn!("Posters not refreshed: {}", e);
        }
        combos.and(posters)
    }
}

#[async_trait]
impl OrderSink for CloudClient {
    async fn post_order(&self, order: &Order) -> Result<()> {
        self.post(&self.config.order_url, "order", order).await?;
        info!("Order {} posted ({})", order.order_code, order.total_bill);
        Ok(())
    }

    async fn post_restock_audit(&self, audit: &RestockAudit) -> Result<()> {
        self.post(&self.config.restock_history_url, "restock_history", audit).await?;
        info!("Restock history posted for badge {}", audit.user_rfid);
        Ok(())
    }
}

/// Make relative image paths absolute
fn with_image_prefix(mut products: Vec<Product>, prefix: &str) -> Vec<Product> {
    if prefix.is_empty() {
        return products;
    }
    for product in &mut products {
        if let Some(url) = &product.img_url {
            if !url.is_empty() && !url.starts_with("http") {
                product.img_url = Some(format!("{}{}", prefix, url));
            }
        }
    }
    products
}

fn read_cache<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let contents = std::fs::read_to_string(dir.join(file))?;
    Ok(serde_json::from_str(&contents)?)
}

async fn write_cache<T: Serialize + ?Sized>(dir: &Path, file: &str, value: &T) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let json = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(dir.join(file), json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn product(id: &str, img: Option<&str>) -> Product {
        Product {
            product_id: id.to_string(),
            product_name: id.to_string(),
            price: 1000,
            weight: 30,
            discount: 0,
            img_url: img.map(str::to_string),
        }
    }

    #[test]
    fn test_relative_images_prefixed() {
        let products = with_image_prefix(
            vec![product("a", Some("/img/a.png")), product("b", Some("https://cdn/b.png")), product("c", None)],
            "http://cloud:3000",
        );
        assert_eq!(products[0].img_url.as_deref(), Some("http://cloud:3000/img/a.png"));
        assert_eq!(products[1].img_url.as_deref(), Some("https://cdn/b.png"));
        assert_eq!(products[2].img_url, None);
    }

    #[tokio::test]
    async fn test_unconfigured_cloud_falls_back_to_cache() {
        let dir = TempDir::new().unwrap();
        write_cache(dir.path(), PRODUCTS_CACHE, &vec![product("cached", None)]).await.unwrap();
        write_cache(dir.path(), BADGES_CACHE, &vec!["badge-1".to_string()]).await.unwrap();

        let client = CloudClient::new(CloudConfig::default(), dir.path()).unwrap();
        let catalog = client.products().await.unwrap();
        let badges = client.badge_allow_list().await.unwrap();

        assert_eq!(catalog.product_ids(), vec!["cached".to_string()]);
        assert_eq!(badges, vec!["badge-1".to_string()]);
        assert_eq!(client.cached_catalog(), catalog);
    }

    #[tokio::test]
    async fn test_no_cloud_no_cache_is_an_error() {
        let dir = TempDir::new().unwrap();
        let client = CloudClient::new(CloudConfig::default(), dir.path()).unwrap();

        assert!(client.products().await.is_err());
        assert!(client.cached_badges().is_empty());
        assert!(matches!(
            client.refresh_auxiliary().await,
            Err(Error::EndpointMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_post_without_endpoint_fails() {
        let dir = TempDir::new().unwrap();
        let client = CloudClient::new(CloudConfig::default(), dir.path()).unwrap();
        let audit = RestockAudit {
            shelf_id: "s".to_string(),
            user_rfid: "b".to_string(),
            pre_products: vec![],
            post_products: vec![],
            pre_verified_quantity: [0; 15],
            post_verified_quantity: [0; 15],
        };
        assert!(matches!(
            client.post_restock_audit(&audit).await,
            Err(Error::EndpointMissing("restock_history"))
        ));
    }
}
