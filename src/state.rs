use crate::cart::Cart;
use crate::database::{DbError, DbResult, LibraryDb};
use crate::library::Library;
use crate::model::CartItem;
use crate::player::{Access, Player, PlayerInput, PlayerUpdate, PlayerView};
use crate::watchlist::Watchlist;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Deserialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("{0}")]
    Invalid(&'static str),
    #[error("Payment could not be completed. Please try again.")]
    Db(#[from] DbError),
}

/// Fields of the simulated payment form.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct PaymentForm {
    pub email: String,
    pub card_number: String,
    pub expiry_date: String,
    pub cvv: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
}

fn digits(s: &str) -> Option<usize> {
    let cleaned: Vec<char> = s.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    if cleaned.iter().all(char::is_ascii_digit) {
        Some(cleaned.len())
    } else {
        None
    }
}

impl PaymentForm {
    pub fn validate(&self) -> Result<(), CheckoutError> {
        let required = [
            &self.email,
            &self.card_number,
            &self.expiry_date,
            &self.cvv,
            &self.name,
        ];
        if required.iter().any(|f| f.trim().is_empty()) {
            return Err(CheckoutError::Invalid("Please fill in all required fields"));
        }
        if !self.email.contains('@') {
            return Err(CheckoutError::Invalid("Please enter a valid email address"));
        }
        match digits(&self.card_number) {
            Some(n) if n >= 12 && n <= 19 => {}
            _ => return Err(CheckoutError::Invalid("Please enter a valid card number")),
        }
        match digits(&self.cvv) {
            Some(n) if n == 3 || n == 4 => {}
            _ => return Err(CheckoutError::Invalid("Please enter a valid CVV")),
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything the pages share: persistent store plus per-user carts,
/// watchlists and player sessions that only live as long as the process.
pub struct AppState {
    db: sled::Db,
    carts: Mutex<HashMap<u64, Cart>>,
    watchlists: Mutex<HashMap<u64, Watchlist>>,
    /// Keyed by (user id, movie id).
    players: Mutex<HashMap<(u64, u64), Player>>,
    library_lock: Mutex<()>,
    checkout_delay: Duration,
    bcrypt_cost: u32,
}

impl AppState {
    pub fn new(db: sled::Db, checkout_delay: Duration, bcrypt_cost: u32) -> Self {
        AppState {
            db,
            carts: Mutex::new(HashMap::new()),
            watchlists: Mutex::new(HashMap::new()),
            players: Mutex::new(HashMap::new()),
            library_lock: Mutex::new(()),
            checkout_delay,
            bcrypt_cost,
        }
    }

    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    pub fn with_cart<R>(&self, user_id: u64, f: impl FnOnce(&mut Cart) -> R) -> R {
        let mut carts = lock(&self.carts);
        f(carts.entry(user_id).or_insert_with(Cart::new))
    }

    pub fn with_watchlist<R>(&self, user_id: u64, f: impl FnOnce(&mut Watchlist) -> R) -> R {
        let mut watchlists = lock(&self.watchlists);
        f(watchlists.entry(user_id).or_insert_with(Watchlist::new))
    }

    pub fn library(&self, user_id: u64) -> DbResult<Library> {
        self.db.load_library(user_id)
    }

    /// Loads, mutates and writes back a library as one step.
    pub fn update_library<R>(
        &self,
        user_id: u64,
        f: impl FnOnce(&mut Library) -> R,
    ) -> DbResult<R> {
        let _guard = lock(&self.library_lock);
        let mut library = self.db.load_library(user_id)?;
        let result = f(&mut library);
        self.db.save_library(user_id, &library)?;
        Ok(result)
    }

    /// Moves `items` into the library, stamped with `now`, and drops them
    /// from the cart. Anything else in the cart stays there.
    pub fn complete_checkout(
        &self,
        user_id: u64,
        items: &[CartItem],
        now: DateTime<Utc>,
    ) -> Result<usize, CheckoutError> {
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        self.update_library(user_id, |library| {
            for item in items {
                library.add(item, now);
            }
        })?;
        self.with_cart(user_id, |cart| {
            for item in items {
                let (id, quality, duration) = item.key();
                cart.remove(id, quality, duration);
            }
        });
        self.close_players(user_id);
        info!("User {} checked out {} item(s)", user_id, items.len());
        Ok(items.len())
    }

    /// Validates the payment form, simulates the payment round trip and
    /// completes the purchase of what the cart held when the form arrived.
    pub async fn checkout(&self, user_id: u64, form: &PaymentForm) -> Result<usize, CheckoutError> {
        let items = self.with_cart(user_id, |cart| cart.items().to_vec());
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        form.validate()?;
        actix_rt::time::delay_for(self.checkout_delay).await;
        self.complete_checkout(user_id, &items, Utc::now())
    }

    fn new_player(
        &self,
        user_id: Option<u64>,
        movie_id: u64,
        duration_hint: f64,
        now: DateTime<Utc>,
    ) -> DbResult<Player> {
        let access = match user_id {
            Some(user_id) => {
                let library = self.library(user_id)?;
                Access::from_grant(library.best_access(movie_id, now), now)
            }
            None => Access::from_grant(None, now),
        };
        Ok(Player::new(access, duration_hint, now))
    }

    /// Starts a fresh player session, replacing any earlier one for the same
    /// title. Signed out viewers get a throwaway player.
    pub fn open_player(
        &self,
        user_id: Option<u64>,
        movie_id: u64,
        duration_hint: f64,
        now: DateTime<Utc>,
    ) -> DbResult<PlayerView> {
        let player = self.new_player(user_id, movie_id, duration_hint, now)?;
        let view = player.view();
        if let Some(user_id) = user_id {
            lock(&self.players).insert((user_id, movie_id), player);
        }
        Ok(view)
    }

    /// Feeds one page input into the viewer's player session, opening one if
    /// the page was never loaded.
    pub fn drive_player(
        &self,
        user_id: Option<u64>,
        movie_id: u64,
        input: PlayerInput,
        now: DateTime<Utc>,
        at: Instant,
    ) -> DbResult<PlayerUpdate> {
        let user_id = match user_id {
            Some(user_id) => user_id,
            None => return Ok(self.new_player(None, movie_id, 0.0, now)?.apply(input, now, at)),
        };
        let mut players = lock(&self.players);
        let player = match players.entry((user_id, movie_id)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("Opening player for user {} on {}", user_id, movie_id);
                entry.insert(self.new_player(Some(user_id), movie_id, 0.0, now)?)
            }
        };
        Ok(player.apply(input, now, at))
    }

    /// Drops the user's player sessions so the next page load re-reads the
    /// library.
    pub fn close_players(&self, user_id: u64) {
        lock(&self.players).retain(|&(user, _), _| user != user_id);
    }
}
