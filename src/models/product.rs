use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

/// Categories offered by the catalog client's picker. The API accepts any value.
pub const SUGGESTED_CATEGORIES: &[&str] = &[
    "Electrónica",
    "Ropa",
    "Alimentos",
    "Hogar",
    "Deportes",
    "Otros",
];

/// Field names in the order the client sends them.
pub const PRODUCT_FIELDS: [&str; 6] = [
    "nombre",
    "descripcion",
    "precio",
    "estado",
    "categoria",
    "url_fotografia",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub nombre: String,
    pub descripcion: String,
    pub precio: f64,
    pub estado: bool,
    pub categoria: String,
    pub url_fotografia: String,
}

impl Product {
    pub fn from_input(id: i64, input: ProductInput) -> Self {
        Self {
            id,
            nombre: input.nombre,
            descripcion: input.descripcion,
            precio: input.precio,
            estado: input.estado,
            categoria: input.categoria,
            url_fotografia: input.url_fotografia,
        }
    }
}

/// Row shape as read from `productos`; `estado` arrives as a TINYINT.
#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub nombre: String,
    pub descripcion: String,
    pub precio: f64,
    pub estado: i64,
    pub categoria: String,
    pub url_fotografia: String,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            nombre: row.nombre,
            descripcion: row.descripcion,
            precio: row.precio,
            estado: row.estado != 0,
            categoria: row.categoria,
            url_fotografia: row.url_fotografia,
        }
    }
}

/// A complete product without its id. Only produced by [`validate_product`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductInput {
    pub nombre: String,
    pub descripcion: String,
    pub precio: f64,
    pub estado: bool,
    pub categoria: String,
    pub url_fotografia: String,
}

/// How required fields are checked on create and update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Truthiness checks as the mobile client has always been served:
    /// `""`, `0`, `false` and `null` count as missing, except `estado`,
    /// which is missing only when the key is absent. `precio: 0` is rejected.
    #[default]
    Compat,
    /// Explicit presence checks: non-null key of the right type, text non-empty,
    /// `precio` finite and not negative.
    Strict,
}

/// Checks a create/update payload. On failure returns the offending field names.
pub fn validate_product(
    payload: &Map<String, Value>,
    mode: ValidationMode,
) -> Result<ProductInput, Vec<&'static str>> {
    let mut invalid = Vec::new();

    let nombre = text_field(payload, "nombre", &mut invalid);
    let descripcion = text_field(payload, "descripcion", &mut invalid);
    let precio = price_field(payload, mode, &mut invalid);
    let estado = status_field(payload, mode, &mut invalid);
    let categoria = text_field(payload, "categoria", &mut invalid);
    let url_fotografia = text_field(payload, "url_fotografia", &mut invalid);

    match (nombre, descripcion, precio, estado, categoria, url_fotografia) {
        (Some(nombre), Some(descripcion), Some(precio), Some(estado), Some(categoria), Some(url_fotografia)) => {
            Ok(ProductInput {
                nombre,
                descripcion,
                precio,
                estado,
                categoria,
                url_fotografia,
            })
        }
        _ => Err(invalid),
    }
}

/// JavaScript truthiness of a JSON value.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn text_field(
    payload: &Map<String, Value>,
    field: &'static str,
    invalid: &mut Vec<&'static str>,
) -> Option<String> {
    // Both modes agree for text: present, a string, non-empty.
    match payload.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => {
            invalid.push(field);
            None
        }
    }
}

fn price_field(
    payload: &Map<String, Value>,
    mode: ValidationMode,
    invalid: &mut Vec<&'static str>,
) -> Option<f64> {
    let value = payload.get("precio");
    let precio = match mode {
        ValidationMode::Compat => value.filter(|v| is_truthy(v)).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }),
        ValidationMode::Strict => value
            .and_then(Value::as_f64)
            .filter(|f| f.is_finite() && *f >= 0.0),
    };
    if precio.is_none() {
        invalid.push("precio");
    }
    precio
}

fn status_field(
    payload: &Map<String, Value>,
    mode: ValidationMode,
    invalid: &mut Vec<&'static str>,
) -> Option<bool> {
    let estado = match (mode, payload.get("estado")) {
        (_, Some(Value::Bool(b))) => Some(*b),
        (ValidationMode::Compat, Some(Value::Number(n))) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    };
    if estado.is_none() {
        invalid.push("estado");
    }
    estado
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
