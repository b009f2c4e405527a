mod common;

use actix_web::{web, App, HttpServer};

use common::{registration, test_state};
use taskboard::board::{BoardController, ClientError, HttpTaskApi, MoveIntent, SessionState};
use taskboard::middleware::Authentication;
use taskboard::models::{CreateTaskInput, TaskStatus};
use taskboard::routes;

fn spawn_server() -> String {
    let state = test_state();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Authentication::new(state.auth().clone()))
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .workers(1)
    .bind("127.0.0.1:0")
    .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{}", addr)
}

#[actix_web::test]
async fn board_round_trips_through_the_http_api() {
    let base = spawn_server();
    let mut board = BoardController::new(HttpTaskApi::new(&base));

    board.register(registration("alice@example.com")).await.unwrap();
    assert_eq!(board.state(), SessionState::Ready);

    let task = board
        .create_task(CreateTaskInput {
            title: Some("Ship release".to_string()),
            due_date: Some("2020-01-01".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Todo);

    let moved = board
        .move_task(&MoveIntent::new("todo", "in-progress", &task.id, 0))
        .await
        .unwrap();
    assert!(moved);
    assert_eq!(board.tasks()[0].status, TaskStatus::InProgress);

    let api = HttpTaskApi::new(&base);
    let token = {
        let auth = taskboard::board::TaskApi::login(
            &api,
            &taskboard::models::LoginInput {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            },
        )
        .await
        .unwrap();
        auth.access_token
    };
    let stats = api.statistics(&token).await.unwrap();
    assert_eq!(stats.by_status[&TaskStatus::InProgress], 1);
    let overdue = api.overdue(&token).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(api.me(&token).await.unwrap().email, "alice@example.com");
    assert_eq!(api.statuses().await.unwrap().len(), 4);

    board.delete_task(&task.id).await.unwrap();
    board.refresh().await.unwrap();
    assert!(board.tasks().is_empty());
}

#[actix_web::test]
async fn server_errors_carry_status_and_message() {
    let base = spawn_server();
    let api = HttpTaskApi::new(&base);

    let err = api.statistics("garbage").await.unwrap_err();
    match err {
        ClientError::Api { status, .. } => assert_eq!(status, 401),
        other => panic!("unexpected error: {other}"),
    }

    let mut board = BoardController::new(HttpTaskApi::new(&base));
    board.register(registration("bob@example.com")).await.unwrap();
    let mut again = BoardController::new(HttpTaskApi::new(&base));
    let err = again
        .register(registration("bob@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 409, .. }));
}
