use crate::{
    dto::products::ProductList,
    error::{AppError, AppResult},
    models::Product,
    repository::ProductFilter,
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    state::AppState,
    tracking::TrackingEvent,
};

const SLUG_ID_CHARS: usize = 6;

/// Lists storefront products. A search term is recorded with its result
/// count.
pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
    session_id: Option<&str>,
) -> AppResult<ApiResponse<ProductList>> {
    let search = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let category = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let (items, total) = state
        .products
        .list(ProductFilter { search, category }, query.pagination.request())
        .await?;

    if let Some(term) = search {
        state.tracker.track(TrackingEvent::search(term, total, session_id));
    }

    let meta = Meta::paged(&query.pagination, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

/// Loads a product and counts the view.
pub async fn get_product(state: &AppState, id: &str, session_id: Option<&str>) -> AppResult<Product> {
    let product = state.products.get(id).await?.ok_or(AppError::NotFound)?;
    state.tracker.track(TrackingEvent::view_item(&product, session_id));
    Ok(product)
}

/// Resolves a storefront URL slug: the stored slug first, then the
/// generated `name-slug-<last 6 id chars>` form.
pub async fn get_product_by_slug(
    state: &AppState,
    slug: &str,
    session_id: Option<&str>,
) -> AppResult<Product> {
    let product = resolve_slug(state, slug).await?;
    state.tracker.track(TrackingEvent::view_item(&product, session_id));
    Ok(product)
}

async fn resolve_slug(state: &AppState, slug: &str) -> AppResult<Product> {
    if let Some(product) = state.products.find_by_slug(slug).await? {
        return Ok(product);
    }

    let Some((_, suffix)) = slug.rsplit_once('-') else {
        return Err(AppError::NotFound);
    };
    state
        .products
        .find_by_id_suffix(suffix)
        .await?
        .into_iter()
        .find(|product| generate_product_slug(&product.name, &product.id) == slug)
        .ok_or(AppError::NotFound)
}

/// The slug a product is linked under.
pub fn product_slug(product: &Product) -> String {
    match product.slug.as_deref().filter(|slug| !slug.is_empty()) {
        Some(slug) => slug.to_string(),
        None => generate_product_slug(&product.name, &product.id),
    }
}

pub fn generate_product_slug(name: &str, id: &str) -> String {
    let start = id
        .char_indices()
        .rev()
        .nth(SLUG_ID_CHARS - 1)
        .map_or(0, |(index, _)| index);
    format!("{}-{}", slugify(name), &id[start..])
}

/// Lowercase ASCII words joined by single dashes. Accented Latin letters
/// lose their accents; other symbols are dropped.
pub fn slugify(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        let c = fold_accent(c);
        if c.is_ascii_alphanumeric() || c == '-' || c.is_whitespace() {
            cleaned.push(c);
        }
    }

    let mut slug = String::with_capacity(cleaned.len());
    for c in cleaned.trim().chars() {
        let c = if c.is_whitespace() { '-' } else { c };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    slug
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}
