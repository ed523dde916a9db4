use crate::auth::{self, AuthError};
use crate::cart::Cart;
use crate::model::*;
use crate::database::SettingsDb;
use crate::player::{self, PlayerInput, PlayerView, COUNTDOWN_INTERVAL, CONTROLS_HIDE_AFTER};
use crate::pricing::{price, pricing_options};
use crate::search::{self, SearchParams};
use crate::state::{AppState, CheckoutError, PaymentForm};
use crate::tmdb::{or_empty, trailer, TmdbClient};
use actix_identity::Identity;
use actix_web::{error, http::StatusCode, web, HttpResponse};
use chrono::Utc;
use log::{debug, warn};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::time::Instant;

type Tera = web::Data<tera::Tera>;
type State = web::Data<AppState>;
type Tmdb = web::Data<TmdbClient>;

/// Stream served to everyone who may watch; titles have no real media.
const SAMPLE_STREAM: &str =
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4";

fn log_error<E: std::fmt::Debug>(err: E, message: &'static str) -> error::Error {
    debug!("{:?}", err);
    error::ErrorInternalServerError(message)
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found().header("location", location).finish()
}

fn current_user(id: &Identity) -> Option<SessionUser> {
    auth::decode_session(id.identity())
}

/// Context every page extends: the signed-in user and the cart badge.
fn page_context(user: &Option<SessionUser>, state: &AppState) -> tera::Context {
    let mut ctx = tera::Context::new();
    if let Some(user) = user {
        ctx.insert("user", user);
        ctx.insert("cart_count", &state.with_cart(user.id, |cart| cart.len()));
    } else {
        ctx.insert("cart_count", &0usize);
    }
    ctx
}

fn render(tera: &tera::Tera, name: &str, ctx: &tera::Context) -> actix_web::Result<HttpResponse> {
    render_with(tera, name, ctx, StatusCode::OK)
}

fn render_with(
    tera: &tera::Tera,
    name: &str,
    ctx: &tera::Context,
    status: StatusCode,
) -> actix_web::Result<HttpResponse> {
    let body = tera
        .render(name, ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    Ok(HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(body))
}

macro_rules! signed_in {
    ($id:expr) => {
        match current_user(&$id) {
            Some(user) => user,
            None => return Ok(redirect("/login")),
        }
    };
}

async fn index(id: Identity, tera: Tera, state: State, tmdb: Tmdb) -> actix_web::Result<HttpResponse> {
    let user = current_user(&id);
    let mut ctx = page_context(&user, &state);
    let hero = tmdb.top_trending().await.unwrap_or_else(|err| {
        warn!("{}", err);
        None
    });
    ctx.insert("hero", &hero);
    ctx.insert("popular", &or_empty(tmdb.popular().await));
    ctx.insert("top_rated", &or_empty(tmdb.top_rated().await));
    ctx.insert("now_playing", &or_empty(tmdb.now_playing().await));
    ctx.insert(
        "new_releases",
        &or_empty(tmdb.new_releases(Utc::now().date_naive()).await),
    );
    render(&tera, "index.html", &ctx)
}

#[derive(Serialize)]
struct GrantView<'a> {
    #[serde(flatten)]
    item: &'a LibraryItem,
    expired: bool,
    status: String,
}

fn grant_view(item: &LibraryItem, now: chrono::DateTime<Utc>) -> GrantView {
    let expired = item.is_expired(now);
    let status = match item.expiry_date {
        None => "Owned".to_owned(),
        Some(_) if expired => "Expired".to_owned(),
        Some(expiry) => {
            player::remaining_text(expiry - now).unwrap_or_else(|| "Expired".to_owned())
        }
    };
    GrantView {
        item,
        expired,
        status,
    }
}

async fn movie_detail(
    path: web::Path<u64>,
    id: Identity,
    tera: Tera,
    state: State,
    tmdb: Tmdb,
) -> actix_web::Result<HttpResponse> {
    let movie_id = path.into_inner();
    let user = current_user(&id);
    let mut movie = match tmdb.movie(movie_id).await {
        Ok(movie) => movie,
        Err(err) => {
            warn!("{}", err);
            return not_found_page(&tera, &user, &state);
        }
    };
    if movie.trailer_key.is_none() {
        movie.trailer_key = match tmdb.videos(movie_id).await {
            Ok(videos) => trailer(&videos).map(|v| v.key.clone()),
            Err(err) => {
                warn!("{}", err);
                None
            }
        };
    }
    let mut ctx = page_context(&user, &state);
    ctx.insert("movie", &movie);
    ctx.insert("pricing", &pricing_options());
    if let Some(user) = &user {
        let library = state
            .library(user.id)
            .map_err(|err| log_error(err, "Database error"))?;
        let now = Utc::now();
        ctx.insert(
            "grant",
            &library.best_access(movie_id, now).map(|item| grant_view(item, now)),
        );
        ctx.insert(
            "in_watchlist",
            &state.with_watchlist(user.id, |list| list.contains(movie_id)),
        );
    }
    render(&tera, "movie.html", &ctx)
}

async fn search_page(
    params: web::Query<SearchParams>,
    id: Identity,
    tera: Tera,
    state: State,
    tmdb: Tmdb,
) -> actix_web::Result<HttpResponse> {
    let user = current_user(&id);
    let genres = params.genre_list();
    let mut results = if !params.q.trim().is_empty() {
        or_empty(tmdb.search(params.q.trim()).await)
    } else if !genres.is_empty() {
        or_empty(tmdb.discover_by_genres(&genres).await)
    } else {
        Vec::new()
    };
    search::sort_movies(&mut results, params.sort);
    let mut ctx = page_context(&user, &state);
    ctx.insert("query", &params.q);
    ctx.insert("selected_genres", &genres);
    ctx.insert("genres", search::GENRES);
    ctx.insert("sort", &params.sort);
    ctx.insert("results", &results);
    ctx.insert("debounce_ms", &search::DEBOUNCE_MS);
    render(&tera, "search.html", &ctx)
}

#[derive(Deserialize)]
struct WatchlistForm {
    id: u64,
    title: String,
    #[serde(default)]
    poster_path: String,
    #[serde(default)]
    overview: String,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    vote_average: f32,
}

#[derive(Deserialize)]
struct IdForm {
    id: u64,
}

async fn watchlist_page(id: Identity, tera: Tera, state: State) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    let items = state.with_watchlist(user.id, |list| list.items().to_vec());
    let mut ctx = page_context(&Some(user), &state);
    ctx.insert("items", &items);
    render(&tera, "watchlist.html", &ctx)
}

async fn watchlist_add(
    form: web::Form<WatchlistForm>,
    id: Identity,
    state: State,
) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    let form = form.into_inner();
    let movie_id = form.id;
    state.with_watchlist(user.id, |list| {
        list.add(WatchlistItem {
            id: form.id,
            title: form.title,
            poster_path: form.poster_path,
            overview: form.overview,
            release_date: form.release_date,
            vote_average: form.vote_average,
        })
    });
    Ok(redirect(&format!("/movie/{}", movie_id)))
}

async fn watchlist_remove(
    form: web::Form<IdForm>,
    id: Identity,
    state: State,
) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    state.with_watchlist(user.id, |list| list.remove(form.id));
    Ok(redirect("/watchlist"))
}

#[derive(Deserialize)]
struct CartAddForm {
    id: u64,
    title: String,
    #[serde(default)]
    poster_path: String,
    quality: Quality,
    duration: RentalDuration,
}

#[derive(Deserialize)]
struct CartRemoveForm {
    id: u64,
    quality: Quality,
    duration: RentalDuration,
}

async fn cart_page(id: Identity, tera: Tera, state: State) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    let (items, total) = state.with_cart(user.id, |cart| (cart.items().to_vec(), cart.total()));
    let mut ctx = page_context(&Some(user), &state);
    ctx.insert("items", &items);
    ctx.insert("total", &total);
    render(&tera, "cart.html", &ctx)
}

async fn cart_add(
    form: web::Form<CartAddForm>,
    id: Identity,
    state: State,
) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    let form = form.into_inner();
    let item = CartItem {
        id: form.id,
        title: form.title,
        poster_path: form.poster_path,
        kind: form.duration.purchase_type(),
        price: price(form.quality, form.duration),
        quality: form.quality,
        duration: form.duration,
    };
    if !state.with_cart(user.id, |cart| cart.add(item)) {
        debug!("Item already in cart for user {}", user.id);
    }
    Ok(redirect("/cart"))
}

async fn cart_remove(
    form: web::Form<CartRemoveForm>,
    id: Identity,
    state: State,
) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    state.with_cart(user.id, |cart| cart.remove(form.id, form.quality, form.duration));
    Ok(redirect("/cart"))
}

async fn cart_clear(id: Identity, state: State) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    state.with_cart(user.id, Cart::clear);
    Ok(redirect("/cart"))
}

fn checkout_context(user: SessionUser, state: &AppState) -> Option<tera::Context> {
    let (items, total) = state.with_cart(user.id, |cart| (cart.items().to_vec(), cart.total()));
    if items.is_empty() {
        return None;
    }
    let mut ctx = page_context(&Some(user), state);
    ctx.insert("items", &items);
    ctx.insert("total", &total);
    Some(ctx)
}

async fn checkout_page(id: Identity, tera: Tera, state: State) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    match checkout_context(user, &state) {
        Some(mut ctx) => {
            ctx.insert("form", &PaymentFormView::default());
            render(&tera, "checkout.html", &ctx)
        }
        None => Ok(redirect("/cart")),
    }
}

/// Echo of the payment form minus card secrets.
#[derive(Serialize, Default)]
struct PaymentFormView {
    email: String,
    name: String,
    address: String,
    city: String,
    zip_code: String,
}

async fn checkout_post(
    form: web::Form<PaymentForm>,
    id: Identity,
    tera: Tera,
    state: State,
) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    match state.checkout(user.id, &form).await {
        Ok(count) => Ok(redirect(&format!("/library?purchased={}", count))),
        Err(CheckoutError::EmptyCart) => Ok(redirect("/cart")),
        Err(CheckoutError::Db(err)) => Err(log_error(err, "Database error")),
        Err(err @ CheckoutError::Invalid(_)) => match checkout_context(user, &state) {
            Some(mut ctx) => {
                let form = form.into_inner();
                ctx.insert("error", &err.to_string());
                ctx.insert(
                    "form",
                    &PaymentFormView {
                        email: form.email,
                        name: form.name,
                        address: form.address,
                        city: form.city,
                        zip_code: form.zip_code,
                    },
                );
                render_with(&tera, "checkout.html", &ctx, StatusCode::BAD_REQUEST)
            }
            None => Ok(redirect("/cart")),
        },
    }
}

#[derive(Deserialize)]
struct LibraryParams {
    #[serde(default)]
    tab: Option<String>,
    #[serde(default)]
    purchased: Option<usize>,
}

#[derive(Deserialize)]
struct LibraryRemoveForm {
    id: u64,
    quality: Quality,
    #[serde(rename = "type")]
    kind: PurchaseType,
}

async fn library_page(
    params: web::Query<LibraryParams>,
    id: Identity,
    tera: Tera,
    state: State,
) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    let library = state
        .library(user.id)
        .map_err(|err| log_error(err, "Database error"))?;
    let now = Utc::now();
    let tab = params.tab.as_deref().unwrap_or("all");
    let items: Vec<GrantView> = match tab {
        "rented" => library.rented().map(|i| grant_view(i, now)).collect(),
        "owned" => library.owned().map(|i| grant_view(i, now)).collect(),
        _ => library.items().iter().map(|i| grant_view(i, now)).collect(),
    };
    let mut ctx = page_context(&Some(user), &state);
    ctx.insert("tab", tab);
    ctx.insert("items", &items);
    ctx.insert("total_count", &library.len());
    ctx.insert("rented_count", &library.rented().count());
    ctx.insert("owned_count", &library.owned().count());
    ctx.insert("purchased", &params.purchased);
    render(&tera, "library.html", &ctx)
}

async fn library_remove(
    form: web::Form<LibraryRemoveForm>,
    id: Identity,
    state: State,
) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    state
        .update_library(user.id, |library| library.remove(form.id, form.quality, form.kind))
        .map_err(|err| log_error(err, "Database error"))?;
    state.close_players(user.id);
    Ok(redirect("/library"))
}

async fn profile(id: Identity, tera: Tera, state: State) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    let library = state
        .library(user.id)
        .map_err(|err| log_error(err, "Database error"))?;
    let now = Utc::now();
    let mut ctx = page_context(&Some(user.clone()), &state);
    ctx.insert("profile", &user);
    ctx.insert("total_spent", &library.items().iter().map(|i| i.price).sum::<u32>());
    ctx.insert("owned_count", &library.owned().count());
    ctx.insert(
        "active_rentals",
        &library.rented().filter(|i| !i.is_expired(now)).count(),
    );
    ctx.insert(
        "watchlist_count",
        &state.with_watchlist(user.id, |list| list.items().len()),
    );
    render(&tera, "profile.html", &ctx)
}

/// Everything player.html needs on top of the page basics.
fn player_context(ctx: &mut tera::Context, movie: &Movie, view: &PlayerView) {
    ctx.insert("movie", movie);
    ctx.insert("player", view);
    ctx.insert("src", SAMPLE_STREAM);
    ctx.insert("countdown_ms", &(COUNTDOWN_INTERVAL.as_millis() as u64));
    ctx.insert("hide_controls_ms", &(CONTROLS_HIDE_AFTER.as_millis() as u64));
}

async fn player_page(
    path: web::Path<u64>,
    id: Identity,
    tera: Tera,
    state: State,
    tmdb: Tmdb,
) -> actix_web::Result<HttpResponse> {
    let movie_id = path.into_inner();
    let user = current_user(&id);
    let movie = match tmdb.movie(movie_id).await {
        Ok(movie) => movie,
        Err(err) => {
            warn!("{}", err);
            return not_found_page(&tera, &user, &state);
        }
    };
    let view = state
        .open_player(
            user.as_ref().map(|u| u.id),
            movie_id,
            f64::from(movie.runtime) * 60.0,
            Utc::now(),
        )
        .map_err(|err| log_error(err, "Database error"))?;
    let mut ctx = page_context(&user, &state);
    player_context(&mut ctx, &movie, &view);
    render(&tera, "player.html", &ctx)
}

fn drive_player(
    id: &Identity,
    state: &AppState,
    movie_id: u64,
    input: PlayerInput,
) -> actix_web::Result<HttpResponse> {
    let user_id = current_user(id).map(|u| u.id);
    let update = state
        .drive_player(user_id, movie_id, input, Utc::now(), Instant::now())
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(HttpResponse::Ok().json(update))
}

async fn player_status(
    path: web::Path<u64>,
    id: Identity,
    state: State,
) -> actix_web::Result<HttpResponse> {
    drive_player(&id, &state, path.into_inner(), PlayerInput::Tick)
}

async fn player_input(
    path: web::Path<u64>,
    input: web::Json<PlayerInput>,
    id: Identity,
    state: State,
) -> actix_web::Result<HttpResponse> {
    drive_player(&id, &state, path.into_inner(), input.into_inner())
}

async fn api_pricing() -> HttpResponse {
    HttpResponse::Ok().json(pricing_options())
}

#[derive(Deserialize)]
struct SettingsParams {
    #[serde(default)]
    saved: Option<String>,
}

/// Checkboxes are only sent when ticked.
#[derive(Deserialize)]
struct SettingsForm {
    #[serde(default)]
    email_notifications: Option<String>,
    #[serde(default)]
    push_notifications: Option<String>,
    #[serde(default)]
    sms_notifications: Option<String>,
    #[serde(default)]
    profile_visible: Option<String>,
    #[serde(default)]
    share_watch_history: Option<String>,
    download_quality: Quality,
}

async fn settings_page(
    params: web::Query<SettingsParams>,
    id: Identity,
    tera: Tera,
    state: State,
) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    let settings = state
        .db()
        .load_settings(user.id)
        .map_err(|err| log_error(err, "Database error"))?;
    let mut ctx = page_context(&Some(user), &state);
    ctx.insert("settings", &settings);
    ctx.insert("download_qualities", &Settings::DOWNLOAD_QUALITIES);
    ctx.insert("saved", &params.saved.is_some());
    render(&tera, "settings.html", &ctx)
}

async fn settings_post(
    form: web::Form<SettingsForm>,
    id: Identity,
    state: State,
) -> actix_web::Result<HttpResponse> {
    let user = signed_in!(id);
    let settings = Settings {
        email_notifications: form.email_notifications.is_some(),
        push_notifications: form.push_notifications.is_some(),
        sms_notifications: form.sms_notifications.is_some(),
        profile_visible: form.profile_visible.is_some(),
        share_watch_history: form.share_watch_history.is_some(),
        download_quality: form.download_quality,
    };
    state
        .db()
        .save_settings(user.id, &settings)
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(redirect("/settings?saved"))
}

#[derive(Deserialize)]
struct LoginParams {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct SignupParams {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

fn auth_page(
    tera: &tera::Tera,
    state: &AppState,
    template: &str,
    email: &str,
    error: Option<&AuthError>,
) -> actix_web::Result<HttpResponse> {
    let mut ctx = page_context(&None, state);
    ctx.insert("email", email);
    let status = match error {
        Some(err) => {
            if let AuthError::Db(_) | AuthError::Hash(_) = err {
                warn!("{:?}", err);
            }
            ctx.insert("error", &err.to_string());
            StatusCode::UNAUTHORIZED
        }
        None => StatusCode::OK,
    };
    render_with(tera, template, &ctx, status)
}

async fn login(tera: Tera, state: State) -> actix_web::Result<HttpResponse> {
    auth_page(&tera, &state, "login.html", "", None)
}

async fn login_post(
    params: web::Form<LoginParams>,
    id: Identity,
    tera: Tera,
    state: State,
) -> actix_web::Result<HttpResponse> {
    match auth::login(state.db(), &params.email, &params.password) {
        Ok(user) => {
            id.remember(auth::encode_session(&user));
            Ok(redirect("/"))
        }
        Err(err) => auth_page(&tera, &state, "login.html", &params.email, Some(&err)),
    }
}

async fn signup(tera: Tera, state: State) -> actix_web::Result<HttpResponse> {
    auth_page(&tera, &state, "signup.html", "", None)
}

async fn signup_post(
    params: web::Form<SignupParams>,
    id: Identity,
    tera: Tera,
    state: State,
) -> actix_web::Result<HttpResponse> {
    match auth::signup(
        state.db(),
        &params.name,
        &params.email,
        &params.password,
        state.bcrypt_cost(),
    ) {
        Ok(user) => {
            id.remember(auth::encode_session(&user));
            Ok(redirect("/"))
        }
        Err(err) => auth_page(&tera, &state, "signup.html", &params.email, Some(&err)),
    }
}

async fn logout(id: Identity, state: State) -> actix_web::Result<HttpResponse> {
    if let Some(user) = current_user(&id) {
        state.close_players(user.id);
    }
    id.forget();
    Ok(redirect("/login?logout"))
}

#[derive(RustEmbed)]
#[folder = "static/"]
struct Asset;

async fn static_file(path: web::Path<String>) -> HttpResponse {
    match Asset::get(path.as_str()) {
        Some(file) => {
            let mime = file.metadata.mimetype().to_owned();
            HttpResponse::Ok()
                .content_type(mime)
                .body(file.data.into_owned())
        }
        None => HttpResponse::NotFound().finish(),
    }
}

fn not_found_page(
    tera: &tera::Tera,
    user: &Option<SessionUser>,
    state: &AppState,
) -> actix_web::Result<HttpResponse> {
    let ctx = page_context(user, state);
    render_with(tera, "not_found.html", &ctx, StatusCode::NOT_FOUND)
}

pub async fn not_found(id: Identity, tera: Tera, state: State) -> actix_web::Result<HttpResponse> {
    not_found_page(&tera, &current_user(&id), &state)
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/movie/{id}", web::get().to(movie_detail))
        .route("/search", web::get().to(search_page))
        .route("/watchlist", web::get().to(watchlist_page))
        .route("/watchlist/add", web::post().to(watchlist_add))
        .route("/watchlist/remove", web::post().to(watchlist_remove))
        .route("/cart", web::get().to(cart_page))
        .route("/cart/add", web::post().to(cart_add))
        .route("/cart/remove", web::post().to(cart_remove))
        .route("/cart/clear", web::post().to(cart_clear))
        .route("/checkout", web::get().to(checkout_page))
        .route("/checkout", web::post().to(checkout_post))
        .route("/library", web::get().to(library_page))
        .route("/library/remove", web::post().to(library_remove))
        .route("/profile", web::get().to(profile))
        .route("/settings", web::get().to(settings_page))
        .route("/settings", web::post().to(settings_post))
        .route("/player/{id}", web::get().to(player_page))
        .route("/player/{id}/status", web::get().to(player_status))
        .route("/player/{id}/input", web::post().to(player_input))
        .route("/api/pricing", web::get().to(api_pricing))
        .route("/login", web::get().to(login))
        .route("/login", web::post().to(login_post))
        .route("/signup", web::get().to(signup))
        .route("/signup", web::post().to(signup_post))
        .route("/logout", web::get().to(logout))
        .route("/static/{path:.*}", web::get().to(static_file));
}
