// src/api.rs
use crate::db::DbPool;
use crate::error::ApiError;
use crate::handlers::*;
use log::error;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::convert::Infallible;
use warp::filters::body::BodyDeserializeError;
use warp::http::{Method, StatusCode};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

pub fn routes(pool: DbPool) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    users(pool.clone())
        .or(login(pool.clone()))
        .or(stocks(pool.clone()))
        .or(orders(pool.clone()))
        .or(holdings(pool.clone()))
        .or(user_resources(pool))
        .recover(handle_rejection)
}

fn with_pool(pool: DbPool) -> impl Filter<Extract = (DbPool,), Error = Infallible> + Clone {
    warp::any().map(move || pool.clone())
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
{
    warp::body::json()
}

/// Last alternative on every path: rejects verbs outside `allow` with a 405.
/// Allowed verbs fall through as "not found" so the handler's own rejection
/// is the one reported.
fn method_not_allowed(
    allow: &'static str,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::method().and_then(move |method: Method| async move {
        let rejection = if allow.split(", ").any(|m| m == method.as_str()) {
            warp::reject::not_found()
        } else {
            warp::reject::custom(ApiError::MethodNotAllowed {
                method: method.to_string(),
                allow,
            })
        };
        Err::<Response, Rejection>(rejection)
    })
}

fn users(pool: DbPool) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("users")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(list_users_handler);

    let create = warp::path!("users")
        .and(warp::post())
        .and(with_pool(pool.clone()))
        .and(json_body())
        .and_then(create_user_handler);

    let collection_methods = warp::path!("users").and(method_not_allowed("GET, POST"));

    let get = warp::path!("users" / i64)
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(get_user_handler);

    let update = warp::path!("users" / i64)
        .and(warp::put())
        .and(with_pool(pool.clone()))
        .and(json_body())
        .and_then(update_user_handler);

    let delete = warp::path!("users" / i64)
        .and(warp::delete())
        .and(with_pool(pool))
        .and_then(delete_user_handler);

    let detail_methods = warp::path!("users" / i64)
        .and(method_not_allowed("GET, PUT, DELETE"))
        .map(|_: i64, reply: Response| reply);

    list.or(create)
        .or(collection_methods)
        .or(get)
        .or(update)
        .or(delete)
        .or(detail_methods)
}

fn login(pool: DbPool) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let login = warp::path!("login")
        .and(warp::post())
        .and(with_pool(pool))
        .and(json_body())
        .and_then(login_handler);

    login.or(warp::path!("login").and(method_not_allowed("POST")))
}

fn stocks(pool: DbPool) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("stocks")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(list_stocks_handler);

    let create = warp::path!("stocks")
        .and(warp::post())
        .and(with_pool(pool.clone()))
        .and(json_body())
        .and_then(create_stock_handler);

    let collection_methods = warp::path!("stocks").and(method_not_allowed("GET, POST"));

    let get = warp::path!("stocks" / i64)
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(get_stock_handler);

    let update = warp::path!("stocks" / i64)
        .and(warp::put())
        .and(with_pool(pool.clone()))
        .and(json_body())
        .and_then(update_stock_handler);

    let delete = warp::path!("stocks" / i64)
        .and(warp::delete())
        .and(with_pool(pool))
        .and_then(delete_stock_handler);

    let detail_methods = warp::path!("stocks" / i64)
        .and(method_not_allowed("GET, PUT, DELETE"))
        .map(|_: i64, reply: Response| reply);

    list.or(create)
        .or(collection_methods)
        .or(get)
        .or(update)
        .or(delete)
        .or(detail_methods)
}

fn orders(pool: DbPool) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("orders")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(list_orders_handler);

    let create = warp::path!("orders")
        .and(warp::post())
        .and(with_pool(pool.clone()))
        .and(json_body())
        .and_then(create_order_handler);

    let collection_methods = warp::path!("orders").and(method_not_allowed("GET, POST"));

    let get = warp::path!("orders" / i64)
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(get_order_handler);

    let update = warp::path!("orders" / i64)
        .and(warp::put())
        .and(with_pool(pool.clone()))
        .and(json_body())
        .and_then(update_order_handler);

    let delete = warp::path!("orders" / i64)
        .and(warp::delete())
        .and(with_pool(pool))
        .and_then(delete_order_handler);

    let detail_methods = warp::path!("orders" / i64)
        .and(method_not_allowed("GET, PUT, DELETE"))
        .map(|_: i64, reply: Response| reply);

    list.or(create)
        .or(collection_methods)
        .or(get)
        .or(update)
        .or(delete)
        .or(detail_methods)
}

fn holdings(pool: DbPool) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("holdings")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(list_holdings_handler);

    let create = warp::path!("holdings")
        .and(warp::post())
        .and(with_pool(pool.clone()))
        .and(json_body())
        .and_then(create_holding_handler);

    let collection_methods = warp::path!("holdings").and(method_not_allowed("GET, POST"));

    let get = warp::path!("holdings" / i64)
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(get_holding_handler);

    let update = warp::path!("holdings" / i64)
        .and(warp::put())
        .and(with_pool(pool.clone()))
        .and(json_body())
        .and_then(update_holding_handler);

    let delete = warp::path!("holdings" / i64)
        .and(warp::delete())
        .and(with_pool(pool))
        .and_then(delete_holding_handler);

    let detail_methods = warp::path!("holdings" / i64)
        .and(method_not_allowed("GET, PUT, DELETE"))
        .map(|_: i64, reply: Response| reply);

    list.or(create)
        .or(collection_methods)
        .or(get)
        .or(update)
        .or(delete)
        .or(detail_methods)
}

/// Per-user views: portfolio, orders, holdings, watchlist and net worth.
fn user_resources(pool: DbPool) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let portfolio = warp::path!("users" / i64 / "portfolio")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(portfolio_handler);

    let portfolio_methods = warp::path!("users" / i64 / "portfolio")
        .and(method_not_allowed("GET"))
        .map(|_: i64, reply: Response| reply);

    let orders = warp::path!("users" / i64 / "orders")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(user_orders_handler);

    let orders_methods = warp::path!("users" / i64 / "orders")
        .and(method_not_allowed("GET"))
        .map(|_: i64, reply: Response| reply);

    let holdings = warp::path!("users" / i64 / "holdings")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(user_holdings_handler);

    let holdings_methods = warp::path!("users" / i64 / "holdings")
        .and(method_not_allowed("GET"))
        .map(|_: i64, reply: Response| reply);

    let net_worth = warp::path!("users" / i64 / "networth")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(net_worth_handler);

    let net_worth_methods = warp::path!("users" / i64 / "networth")
        .and(method_not_allowed("GET"))
        .map(|_: i64, reply: Response| reply);

    let watchlist = warp::path!("users" / i64 / "watchlist")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(list_watchlist_handler);

    let watch = warp::path!("users" / i64 / "watchlist")
        .and(warp::post())
        .and(with_pool(pool.clone()))
        .and(json_body())
        .and_then(add_watchlist_handler);

    let watchlist_methods = warp::path!("users" / i64 / "watchlist")
        .and(method_not_allowed("GET, POST"))
        .map(|_: i64, reply: Response| reply);

    let unwatch = warp::path!("users" / i64 / "watchlist" / i64)
        .and(warp::delete())
        .and(with_pool(pool))
        .and_then(remove_watchlist_handler);

    let unwatch_methods = warp::path!("users" / i64 / "watchlist" / i64)
        .and(method_not_allowed("DELETE"))
        .map(|_: i64, _: i64, reply: Response| reply);

    portfolio
        .or(portfolio_methods)
        .or(orders)
        .or(orders_methods)
        .or(holdings)
        .or(holdings_methods)
        .or(net_worth)
        .or(net_worth_methods)
        .or(watchlist)
        .or(watch)
        .or(watchlist_methods)
        .or(unwatch)
        .or(unwatch_methods)
}

fn json_error(message: &str, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(&json!({ "error": message })), status)
        .into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(api_error) = err.find::<ApiError>() {
        let response = match api_error {
            ApiError::MethodNotAllowed { allow, .. } => warp::reply::with_header(
                warp::reply::with_status(api_error.to_string(), api_error.status()),
                "Allow",
                *allow,
            )
            .into_response(),
            _ => json_error(&api_error.to_string(), api_error.status()),
        };
        return Ok(response);
    }

    if err.is_not_found() {
        return Ok(json_error("Not found", StatusCode::NOT_FOUND));
    }

    if err.find::<BodyDeserializeError>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        return Ok(json_error("Invalid request body", StatusCode::BAD_REQUEST));
    }

    error!("Unhandled rejection: {:?}", err);
    Ok(json_error(
        "Internal server error",
        StatusCode::INTERNAL_SERVER_ERROR,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::tests::memory_pool;
    use serde_json::Value;
    use warp::http::Response as HttpResponse;
    use warp::hyper::body::Bytes;

    fn body(res: &HttpResponse<Bytes>) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    async fn send(
        pool: &DbPool,
        method: &str,
        path: &str,
        payload: Option<Value>,
    ) -> HttpResponse<Bytes> {
        let api = routes(pool.clone());
        let mut req = warp::test::request().method(method).path(path);
        if let Some(payload) = payload {
            req = req.json(&payload);
        }
        req.reply(&api).await
    }

    async fn signup(pool: &DbPool, name: &str, cash: f64) -> i64 {
        let res = send(
            pool,
            "POST",
            "/users",
            Some(json!({
                "name": name,
                "email": format!("{}@example.com", name.to_lowercase()),
                "password": "secret",
                "cash_balance": cash,
            })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        body(&res)["id"].as_i64().unwrap()
    }

    async fn list_stock(pool: &DbPool, symbol: &str, price: f64) -> i64 {
        let res = send(
            pool,
            "POST",
            "/stocks",
            Some(json!({
                "symbol": symbol,
                "company_name": format!("{} Corp", symbol),
                "current_price": price,
            })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        body(&res)["id"].as_i64().unwrap()
    }

    fn order(user_id: i64, stock_id: i64, order_type: &str, quantity: i64, price: f64) -> Value {
        json!({
            "user_id": user_id,
            "stock_id": stock_id,
            "order_type": order_type,
            "quantity": quantity,
            "price_per_share": price,
        })
    }

    #[tokio::test]
    async fn buy_within_cash_creates_pending_order() {
        let pool = memory_pool().await;
        let user = signup(&pool, "Alice", 1000.0).await;
        let stock = list_stock(&pool, "AAPL", 100.0).await;

        let res = send(&pool, "POST", "/orders", Some(order(user, stock, "BUY", 4, 250.0))).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let created = body(&res);
        assert_eq!(created["status"], "PENDING");
        assert_eq!(created["total_value"], 1000.0);
        assert_eq!(created["duration"], "DAY");
        assert!(created["id"].as_i64().is_some());
    }

    #[tokio::test]
    async fn buy_over_cash_is_insufficient_funds() {
        let pool = memory_pool().await;
        let user = signup(&pool, "Alice", 500.0).await;
        let stock = list_stock(&pool, "AAPL", 100.0).await;

        let res = send(&pool, "POST", "/orders", Some(order(user, stock, "BUY", 10, 100.0))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res), json!({ "error": "Insufficient funds" }));
    }

    #[tokio::test]
    async fn sell_over_holding_is_insufficient_shares() {
        let pool = memory_pool().await;
        let user = signup(&pool, "Alice", 0.0).await;
        let stock = list_stock(&pool, "AAPL", 100.0).await;
        let res = send(
            &pool,
            "POST",
            "/holdings",
            Some(json!({ "user_id": user, "stock_id": stock, "quantity": 3, "average_cost": 90.0 })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = send(&pool, "POST", "/orders", Some(order(user, stock, "SELL", 4, 100.0))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res)["error"], "Insufficient shares");

        let res = send(&pool, "POST", "/orders", Some(order(user, stock, "SELL", 3, 100.0))).await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn order_validation_messages() {
        let pool = memory_pool().await;
        let user = signup(&pool, "Alice", 1000.0).await;
        let stock = list_stock(&pool, "AAPL", 100.0).await;

        for field in ["user_id", "stock_id", "order_type", "quantity", "price_per_share"] {
            let mut payload = order(user, stock, "BUY", 1, 1.0);
            payload.as_object_mut().unwrap().remove(field);
            let res = send(&pool, "POST", "/orders", Some(payload)).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body(&res)["error"], "Missing required fields", "without {}", field);
        }

        let cases = [
            (order(user, stock, "HOLD", -1, -1.0), "Invalid order type"),
            (order(user, stock, "SELL", 0, 1.0), "Quantity must be positive"),
            (order(user, stock, "BUY", 1, -2.5), "Price must be positive"),
            (order(999, stock, "BUY", 1, 1.0), "User not found"),
            (order(user, 999, "BUY", 1, 1.0), "Stock not found"),
        ];
        for (payload, expected) in cases {
            let res = send(&pool, "POST", "/orders", Some(payload)).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body(&res)["error"], expected);
        }
    }

    #[tokio::test]
    async fn mistyped_order_fields_keep_validation_messages() {
        let pool = memory_pool().await;
        let user = signup(&pool, "Alice", 1000.0).await;
        let stock = list_stock(&pool, "AAPL", 100.0).await;

        let with = |field: &str, value: Value, order_type: &str| {
            let mut payload = order(user, stock, order_type, 1, 1.0);
            payload[field] = value;
            payload
        };
        let cases = [
            (with("quantity", json!(2.5), "HOLD"), "Invalid order type"),
            (with("quantity", json!("x"), "HOLD"), "Invalid order type"),
            (with("order_type", json!(5), "BUY"), "Invalid order type"),
            (with("quantity", json!(-1.5), "BUY"), "Quantity must be positive"),
            (with("quantity", json!(2.5), "BUY"), "Quantity must be positive"),
            (with("price_per_share", json!("abc"), "BUY"), "Price must be positive"),
            (with("user_id", json!("abc"), "BUY"), "User not found"),
            (with("stock_id", json!("abc"), "BUY"), "Stock not found"),
            (with("quantity", Value::Null, "BUY"), "Missing required fields"),
        ];
        for (payload, expected) in cases {
            let res = send(&pool, "POST", "/orders", Some(payload.clone())).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", payload);
            assert_eq!(body(&res)["error"], expected, "{}", payload);
        }
        assert!(db::list_orders(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn orders_are_listed_newest_first_with_display_fields() {
        let pool = memory_pool().await;
        let user = signup(&pool, "Alice", 10_000.0).await;
        let stock = list_stock(&pool, "MSFT", 400.0).await;
        send(&pool, "POST", "/orders", Some(order(user, stock, "BUY", 1, 400.0))).await;
        send(&pool, "POST", "/orders", Some(order(user, stock, "BUY", 2, 400.0))).await;

        let res = send(&pool, "GET", "/orders", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let listed = body(&res);
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0]["quantity"], 2);
        assert_eq!(listed[0]["user_name"], "Alice");
        assert_eq!(listed[0]["symbol"], "MSFT");

        let res = send(&pool, "GET", &format!("/users/{}/orders", user), None).await;
        assert_eq!(body(&res).as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn order_status_can_change_without_settlement() {
        let pool = memory_pool().await;
        let user = signup(&pool, "Alice", 1000.0).await;
        let stock = list_stock(&pool, "AAPL", 100.0).await;
        let res = send(&pool, "POST", "/orders", Some(order(user, stock, "BUY", 5, 100.0))).await;
        let order_id = body(&res)["id"].as_i64().unwrap();
        let path = format!("/orders/{}", order_id);

        let res = send(&pool, "PUT", &path, Some(json!({ "status": "DONE" }))).await;
        assert_eq!(body(&res)["error"], "Invalid order status");

        let res = send(&pool, "PUT", &path, Some(json!({ "status": "EXECUTED" }))).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res)["status"], "EXECUTED");

        let res = send(&pool, "GET", &format!("/users/{}", user), None).await;
        assert_eq!(body(&res)["cash_balance"], 1000.0);

        let res = send(&pool, "DELETE", &path, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = send(&pool, "GET", &path, None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&res)["error"], "Order not found");
    }

    #[tokio::test]
    async fn portfolio_summary_values_holdings_and_cash() {
        let pool = memory_pool().await;
        let user = signup(&pool, "Alice", 1000.0).await;
        let a = list_stock(&pool, "AAA", 100.0).await;
        let b = list_stock(&pool, "BBB", 50.0).await;
        for (stock, quantity) in [(a, 10), (b, 5)] {
            let res = send(
                &pool,
                "POST",
                "/holdings",
                Some(json!({ "user_id": user, "stock_id": stock, "quantity": quantity, "average_cost": 1.0 })),
            )
            .await;
            assert_eq!(res.status(), StatusCode::CREATED);
        }

        let res = send(&pool, "GET", &format!("/users/{}/portfolio", user), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let summary = body(&res);
        assert_eq!(summary["stock_value"], 1250.0);
        assert_eq!(summary["total_value"], 2250.0);
        assert_eq!(summary["cash_balance"], 1000.0);
        assert_eq!(summary["holdings"].as_array().unwrap().len(), 2);
        assert!(summary["last_updated"].is_string());
    }

    #[tokio::test]
    async fn portfolio_for_unknown_user_is_404() {
        let pool = memory_pool().await;
        let res = send(&pool, "GET", "/users/42/portfolio", None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&res), json!({ "error": "User not found" }));
    }

    #[tokio::test]
    async fn stocks_listing_is_sorted_by_symbol() {
        let pool = memory_pool().await;
        let res = send(&pool, "GET", "/stocks", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res), json!([]));

        list_stock(&pool, "MSFT", 400.0).await;
        list_stock(&pool, "aapl", 190.0).await;

        let res = send(&pool, "GET", "/stocks", None).await;
        let symbols: Vec<_> = body(&res)
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["symbol"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
    }

    #[tokio::test]
    async fn stock_validation_and_duplicates() {
        let pool = memory_pool().await;
        list_stock(&pool, "AAPL", 190.0).await;

        let res = send(
            &pool,
            "POST",
            "/stocks",
            Some(json!({ "symbol": "AAPL", "company_name": "Again", "current_price": 1.0 })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res)["error"], "Resource already exists");

        let res = send(
            &pool,
            "POST",
            "/stocks",
            Some(json!({ "symbol": "TOOLONG", "company_name": "X", "current_price": 1.0 })),
        )
        .await;
        assert_eq!(body(&res)["error"], "Invalid stock symbol");

        let res = send(&pool, "POST", "/stocks", Some(json!({ "symbol": "X" }))).await;
        assert_eq!(body(&res)["error"], "Missing required fields");
    }

    #[tokio::test]
    async fn watchlist_add_list_and_remove() {
        let pool = memory_pool().await;
        let user = signup(&pool, "Alice", 0.0).await;
        let stock = list_stock(&pool, "AAPL", 190.0).await;
        let path = format!("/users/{}/watchlist", user);

        let res = send(&pool, "POST", &path, Some(json!({ "stock_id": stock, "name": "Apple" }))).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(body(&res)["symbol"], "AAPL");

        let res = send(&pool, "POST", &path, Some(json!({ "stock_id": stock }))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res)["error"], "Stock already in watchlist");

        let res = send(&pool, "POST", &path, Some(json!({ "stock_id": 999 }))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res)["error"], "Stock not found");

        let res = send(&pool, "POST", "/users/999/watchlist", Some(json!({ "stock_id": stock }))).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&res)["error"], "User not found");

        let res = send(&pool, "GET", &path, None).await;
        assert_eq!(body(&res).as_array().unwrap().len(), 1);

        let item = format!("{}/{}", path, stock);
        let res = send(&pool, "DELETE", &item, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = send(&pool, "DELETE", &item, None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn users_signup_update_and_login() {
        let pool = memory_pool().await;
        let user = signup(&pool, "Alice", 250.0).await;

        let res = send(&pool, "GET", &format!("/users/{}", user), None).await;
        let fetched = body(&res);
        assert_eq!(fetched["name"], "Alice");
        assert!(fetched.get("password").is_none());

        let res = send(
            &pool,
            "PUT",
            &format!("/users/{}", user),
            Some(json!({ "language": "pt", "cash_balance": 300.0 })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res)["language"], "pt");
        assert_eq!(body(&res)["cash_balance"], 300.0);

        let res = send(
            &pool,
            "POST",
            "/login",
            Some(json!({ "email": "alice@example.com", "password": "secret" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res), json!({ "user_id": user }));

        let res = send(&pool, "POST", "/login", Some(json!({ "name": "Alice", "password": "nope" }))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body(&res)["error"], "Invalid credentials");

        let res = send(&pool, "POST", "/users", Some(json!({
            "name": "Alice", "email": "alice@example.com", "password": "x"
        })))
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res)["error"], "Resource already exists");
    }

    #[tokio::test]
    async fn net_worth_history_is_read_only() {
        let pool = memory_pool().await;
        let user = signup(&pool, "Alice", 0.0).await;
        db::insert_net_worth(&pool, user, 1200.0, 200.0, chrono::Utc::now())
            .await
            .unwrap();

        let path = format!("/users/{}/networth", user);
        let res = send(&pool, "GET", &path, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res)[0]["total_balance"], 1200.0);

        let res = send(&pool, "POST", &path, Some(json!({}))).await;
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn unsupported_methods_are_405_with_allow_header() {
        let pool = memory_pool().await;
        let cases = [
            ("DELETE", "/users", "GET, POST"),
            ("PATCH", "/users/1", "GET, PUT, DELETE"),
            ("PUT", "/login", "POST"),
            ("PUT", "/stocks", "GET, POST"),
            ("POST", "/stocks/1", "GET, PUT, DELETE"),
            ("DELETE", "/orders", "GET, POST"),
            ("POST", "/orders/1", "GET, PUT, DELETE"),
            ("PUT", "/holdings", "GET, POST"),
            ("PATCH", "/holdings/1", "GET, PUT, DELETE"),
            ("DELETE", "/users/1/portfolio", "GET"),
            ("POST", "/users/1/orders", "GET"),
            ("PUT", "/users/1/holdings", "GET"),
            ("DELETE", "/users/1/networth", "GET"),
            ("PUT", "/users/1/watchlist", "GET, POST"),
            ("GET", "/users/1/watchlist/2", "DELETE"),
        ];
        for (method, path, allow) in cases {
            let res = send(&pool, method, path, None).await;
            assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, path);
            assert_eq!(
                &res.body()[..],
                format!("Method {} Not Allowed", method).as_bytes()
            );
            assert_eq!(res.headers()["allow"], allow);
        }
    }

    #[tokio::test]
    async fn unknown_paths_and_bad_bodies() {
        let pool = memory_pool().await;
        let res = send(&pool, "GET", "/nowhere", None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = send(&pool, "GET", "/users/abc", None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let api = routes(pool.clone());
        let res = warp::test::request()
            .method("POST")
            .path("/orders")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res)["error"], "Invalid request body");
    }
}
