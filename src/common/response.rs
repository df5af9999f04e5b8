// src/common/response.rs

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

// ---
// Envelope de sucesso: { success: true, data, message? }
// O frontend nunca precisa adivinhar o formato da resposta.
// ---
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `data` das remoções.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct Deleted {
    pub id: Uuid,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}

// ---
// Paginação dirigida pelo servidor, sempre com o total real.
// ---

pub const DEFAULT_ROWS_PER_PAGE: u32 = 10;
pub const MAX_ROWS_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Página 0-based (igual à TablePagination do frontend)
    pub page: u32,
    pub rows_per_page: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, rows_per_page: Option<u32>) -> Self {
        let rows_per_page = rows_per_page
            .unwrap_or(DEFAULT_ROWS_PER_PAGE)
            .clamp(1, MAX_ROWS_PER_PAGE);
        Self {
            page: page.unwrap_or(0),
            rows_per_page,
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.rows_per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.rows_per_page)
    }

    /// Fatia uma lista já carregada em memória (repositórios em memória).
    #[cfg(test)]
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as i64;
        let items = items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.rows_per_page as usize)
            .collect();
        Page::new(items, total, *self)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub rows_per_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            rows_per_page: pagination.rows_per_page,
        }
    }
}

/// Termo de busca para `ILIKE ... ESCAPE '\'`. Busca vazia ou só com espaços = sem filtro.
/// `%` e `_` digitados pelo usuário valem como texto.
pub fn search_pattern(search: Option<&str>) -> Option<String> {
    search.map(str::trim).filter(|s| !s.is_empty()).map(|s| {
        let mut escaped = String::with_capacity(s.len() + 2);
        escaped.push('%');
        for ch in s.to_lowercase().chars() {
            if matches!(ch, '\\' | '%' | '_') {
                escaped.push('\\');
            }
            escaped.push(ch);
        }
        escaped.push('%');
        escaped
    })
}

/// Mesmo critério do ILIKE, para as implementações em memória.
#[cfg(test)]
pub fn matches_search(search: Option<&str>, haystacks: &[&str]) -> bool {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        None => true,
        Some(term) => {
            let term = term.to_lowercase();
            haystacks.iter().any(|h| h.to_lowercase().contains(&term))
        }
    }
}
