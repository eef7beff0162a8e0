use bank::catalog::Restaurant;
use rand::{seq::SliceRandom, thread_rng};

use crate::error::AppError;

pub const MAX_UID_LEN: usize = 128;

/// Uids come from the gateway already authenticated; this only keeps Redis keys sane.
pub fn check_uid(uid: &str) -> Result<&str, AppError> {
    if uid.is_empty()
        || uid.len() > MAX_UID_LEN
        || uid.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(AppError::MalformedPayload);
    }

    Ok(uid)
}

pub fn check_page(page: u32, max_page: u32) -> Result<u32, AppError> {
    if page == 0 || page > max_page {
        return Err(AppError::PageOutOfRange(page));
    }

    Ok(page)
}

/// Up to `amount` distinct restaurants in random order.
pub fn sample_restaurants(restaurants: &[Restaurant], amount: usize) -> Vec<Restaurant> {
    let mut rng = thread_rng();

    restaurants
        .choose_multiple(&mut rng, amount)
        .cloned()
        .collect()
}
