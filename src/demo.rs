//! # Demo API
//!
//! A small users, cycle-days and quiz-questions service used by the
//! `swaggerware serve` command and the end-to-end tests. Each handler carries
//! its Swagger operation in its documentation text, after a `---` line.
//!
//! [`Store`] is an in-memory stand-in for a real datastore.

use crate::dispatcher::{Dispatcher, HandlerRequest};
use crate::registry::{Route, RouteRegistry};
use crate::response::HandlerReply;
use crate::spec::{load_yaml_str, make_backwards_compatible, SpecError};
use crate::transform::{camel_to_snake_keys, Record, RecordValue};
use chrono::NaiveDate;
use chrono_tz::Tz;
use http::Method;
use serde_json::{json, Value};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// The base document the demo routes are merged into.
pub const BASE_DOCUMENT: &str = include_str!("../doc/swagger.yml");

/// Allowed cervical mucus observations, least to most fertile.
pub const CERVICAL_MUCUS_CHOICES: [&str; 7] = ["t", "0", "f", "(S)", "S", "(S+)", "S+"];

/// Parse [`BASE_DOCUMENT`].
pub fn base_document() -> Result<Value, SpecError> {
    let mut doc = load_yaml_str(BASE_DOCUMENT)?;
    make_backwards_compatible(&mut doc);
    Ok(doc)
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub user_name: String,
    pub birth_date: Option<NaiveDate>,
    pub timezone: Tz,
}

impl Record for User {
    fn get(&self, name: &str) -> Option<RecordValue> {
        match name {
            "id" => Some(self.id.into()),
            "email" => Some(self.email.as_str().into()),
            "user_name" => Some(self.user_name.as_str().into()),
            "birth_date" => Some(self.birth_date.into()),
            "timezone" => Some(self.timezone.into()),
            _ => None,
        }
    }

    fn fields(&self) -> Vec<(String, RecordValue)> {
        ["id", "email", "user_name", "birth_date", "timezone"]
            .iter()
            .filter_map(|name| self.get(name).map(|v| ((*name).to_string(), v)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleDay {
    pub user_id: i64,
    pub date: NaiveDate,
    /// One of [`CERVICAL_MUCUS_CHOICES`], `None` when not observed
    pub cervical_mucus: Option<String>,
}

impl Record for CycleDay {
    fn get(&self, name: &str) -> Option<RecordValue> {
        match name {
            "user_id" => Some(self.user_id.into()),
            "date" => Some(self.date.into()),
            "cervical_mucus" => Some(self.cervical_mucus.clone().into()),
            _ => None,
        }
    }

    fn fields(&self) -> Vec<(String, RecordValue)> {
        ["user_id", "date", "cervical_mucus"]
            .iter()
            .filter_map(|name| self.get(name).map(|v| ((*name).to_string(), v)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: i64,
    pub quiz: String,
    pub title: String,
    pub answers: [Option<String>; 4],
    /// 1-based index into `answers`
    pub correct_answer: i64,
    pub author: Option<i64>,
}

impl Record for Question {
    fn get(&self, name: &str) -> Option<RecordValue> {
        match name {
            "id" => Some(self.id.into()),
            "quiz" => Some(self.quiz.as_str().into()),
            "title" => Some(self.title.as_str().into()),
            "answer1" => Some(self.answers[0].clone().into()),
            "answer2" => Some(self.answers[1].clone().into()),
            "answer3" => Some(self.answers[2].clone().into()),
            "answer4" => Some(self.answers[3].clone().into()),
            "correct_answer" => Some(self.correct_answer.into()),
            "author" => Some(self.author.into()),
            _ => None,
        }
    }

    fn fields(&self) -> Vec<(String, RecordValue)> {
        [
            "id",
            "quiz",
            "title",
            "answer1",
            "answer2",
            "answer3",
            "answer4",
            "correct_answer",
            "author",
        ]
        .iter()
        .filter_map(|name| self.get(name).map(|v| ((*name).to_string(), v)))
        .collect()
    }
}

/// A question with its correct answer hidden.
#[derive(Debug, Clone)]
struct Redacted(Question);

impl Record for Redacted {
    fn get(&self, name: &str) -> Option<RecordValue> {
        match name {
            "correct_answer" => None,
            other => self.0.get(other),
        }
    }

    fn fields(&self) -> Vec<(String, RecordValue)> {
        self.0
            .fields()
            .into_iter()
            .filter(|(name, _)| name != "correct_answer")
            .collect()
    }
}

/// Fields of a question submitted by a client.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestion {
    pub quiz: String,
    pub title: String,
    pub answers: [Option<String>; 4],
    pub correct_answer: i64,
}

impl NewQuestion {
    /// Read a question from a body whose keys are already snake_case.
    #[must_use]
    pub fn from_json(body: &Value) -> Option<Self> {
        let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            quiz: text("quiz")?,
            title: text("title")?,
            answers: [text("answer1"), text("answer2"), text("answer3"), text("answer4")],
            correct_answer: body.get("correct_answer").and_then(Value::as_i64)?,
        })
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    cycle_days: Vec<CycleDay>,
    questions: Vec<Question>,
}

/// In-memory datastore.
#[derive(Debug, Default)]
pub struct Store {
    tables: RwLock<Tables>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with two users, a few cycle days and a small quiz.
    #[must_use]
    pub fn seeded() -> Self {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
        let store = Self::new();
        {
            let mut tables = store.write();
            tables.users = vec![
                User {
                    id: 1,
                    email: "ada@example.com".to_string(),
                    user_name: "ada".to_string(),
                    birth_date: Some(date(1990, 12, 10)),
                    timezone: chrono_tz::Europe::London,
                },
                User {
                    id: 2,
                    email: "grace@example.com".to_string(),
                    user_name: "grace".to_string(),
                    birth_date: None,
                    timezone: chrono_tz::America::New_York,
                },
            ];
            tables.cycle_days = vec![
                CycleDay {
                    user_id: 1,
                    date: date(2024, 3, 1),
                    cervical_mucus: Some("S".to_string()),
                },
                CycleDay {
                    user_id: 1,
                    date: date(2024, 3, 2),
                    cervical_mucus: None,
                },
            ];
            tables.questions = vec![
                Question {
                    id: 1,
                    quiz: "rust".to_string(),
                    title: "Which keyword declares an immutable binding?".to_string(),
                    answers: [
                        Some("let".to_string()),
                        Some("var".to_string()),
                        Some("const".to_string()),
                        None,
                    ],
                    correct_answer: 1,
                    author: Some(1),
                },
                Question {
                    id: 2,
                    quiz: "http".to_string(),
                    title: "Which status means the request was malformed?".to_string(),
                    answers: [
                        Some("200".to_string()),
                        Some("400".to_string()),
                        Some("500".to_string()),
                        Some("418".to_string()),
                    ],
                    correct_answer: 2,
                    author: None,
                },
            ];
        }
        store
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.read().users.clone()
    }

    #[must_use]
    pub fn user(&self, id: i64) -> Option<User> {
        self.read().users.iter().find(|u| u.id == id).cloned()
    }

    #[must_use]
    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.read()
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    #[must_use]
    pub fn cycle_days(&self, user_id: i64) -> Vec<CycleDay> {
        self.read()
            .cycle_days
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn questions(&self, quiz: Option<&str>) -> Vec<Question> {
        self.read()
            .questions
            .iter()
            .filter(|q| quiz.is_none_or(|quiz| q.quiz == quiz))
            .cloned()
            .collect()
    }

    pub fn add_question(&self, new: NewQuestion, author: Option<i64>) -> Question {
        let mut tables = self.write();
        let id = tables.questions.iter().map(|q| q.id).max().unwrap_or(0) + 1;
        let question = Question {
            id,
            quiz: new.quiz,
            title: new.title,
            answers: new.answers,
            correct_answer: new.correct_answer,
            author,
        };
        tables.questions.push(question.clone());
        question
    }
}

/// Protobuf form of a user.
#[derive(Clone, PartialEq, prost::Message)]
pub struct UserMessage {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub email: String,
    #[prost(string, tag = "3")]
    pub user_name: String,
    #[prost(string, tag = "4")]
    pub timezone: String,
}

impl From<&User> for UserMessage {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            user_name: user.user_name.clone(),
            timezone: user.timezone.name().to_string(),
        }
    }
}

/// Protobuf request body of `lookup_user`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct UserLookup {
    #[prost(int64, tag = "1")]
    pub id: i64,
}

const LIST_USERS_DOC: &str = "List every user.
---
tags: [users]
responses:
  200:
    description: All users
    schema:
      $ref: '#/definitions/Users'
";

const GET_USER_DOC: &str = "Fetch one user by id.
---
tags: [users]
parameters:
  - name: id
    in: path
    type: integer
responses:
  200:
    description: The user
    schema:
      $ref: '#/definitions/User'
  404:
    description: No such user
    schema:
      $ref: '#/definitions/ErrorResponse'
";

const SEARCH_USERS_DOC: &str = "Find the users registered with an email address.
---
tags: [users]
parameters:
  - name: email
    in: query
    required: true
    type: string
    format: email
responses:
  200:
    description: Matching users
    schema:
      $ref: '#/definitions/Users'
";

const USER_PROTOBUF_DOC: &str = "Fetch one user, protobuf encoded.
---
tags: [users]
produces: [application/x-protobuf]
parameters:
  - name: id
    in: path
    type: integer
responses:
  200:
    description: A protobuf `UserMessage`
  404:
    description: No such user
    schema:
      $ref: '#/definitions/ErrorResponse'
";

const LOOKUP_USER_DOC: &str = "Fetch one user named by a protobuf `UserLookup` body.
---
tags: [users]
consumes: [application/x-protobuf]
produces: [application/x-protobuf]
responses:
  200:
    description: A protobuf `UserMessage`
  404:
    description: No such user
    schema:
      $ref: '#/definitions/ErrorResponse'
";

const CURRENT_USER_DOC: &str = "The user named by the `Authorization: Token <id>` header.
---
tags: [users]
security:
  - token: []
responses:
  200:
    description: The current user
    schema:
      $ref: '#/definitions/User'
";

const CYCLE_DAYS_DOC: &str = "Cycle days recorded by a user.
---
tags: [cycle]
parameters:
  - name: id
    in: path
    type: integer
responses:
  200:
    description: Recorded days, oldest first
    schema:
      type: array
      items:
        $ref: '#/definitions/CycleDay'
  404:
    description: No such user
    schema:
      $ref: '#/definitions/ErrorResponse'
";

const LIST_QUESTIONS_DOC: &str = "List quiz questions.
---
tags: [quiz]
parameters:
  - name: quiz
    in: query
    type: string
    description: Only questions of this quiz
  - name: redact
    in: query
    type: boolean
    description: Hide the correct answers
responses:
  200:
    description: Questions
    schema:
      type: array
      items:
        $ref: '#/definitions/Question'
";

const CREATE_QUESTION_DOC: &str = "Add a question to a quiz.
---
tags: [quiz]
parameters:
  - name: question
    in: body
    required: true
    schema:
      $ref: '#/definitions/NewQuestion'
responses:
  201:
    description: The stored question
    schema:
      $ref: '#/definitions/Question'
";

/// Every demo route, under `base_path`.
#[must_use]
pub fn registry(base_path: &str) -> RouteRegistry {
    let at = |path: &str| format!("{}{path}", base_path.trim_end_matches('/'));
    let mut registry = RouteRegistry::new();
    registry
        .add(Route::new(Method::GET, at("/users"), "list_users").doc(LIST_USERS_DOC))
        .add(Route::new(Method::GET, at("/users/search"), "search_users").doc(SEARCH_USERS_DOC))
        .add(Route::new(Method::GET, at("/users/<int:id>"), "get_user").doc(GET_USER_DOC))
        .add(
            Route::new(Method::GET, at("/users/<int:id>/protobuf"), "get_user_protobuf")
                .doc(USER_PROTOBUF_DOC),
        )
        .add(Route::new(Method::POST, at("/users/lookup"), "lookup_user").doc(LOOKUP_USER_DOC))
        .add(
            Route::new(Method::GET, at("/me"), "current_user")
                .doc(CURRENT_USER_DOC)
                .requires_auth(),
        )
        .add(
            Route::new(Method::GET, at("/users/<int:id>/cycle-days"), "list_cycle_days")
                .doc(CYCLE_DAYS_DOC),
        )
        .add(
            Route::new(Method::GET, at("/questions"), "list_questions")
                .method(Method::HEAD)
                .doc(LIST_QUESTIONS_DOC),
        )
        .add(
            Route::new(Method::POST, at("/questions"), "create_question").doc(CREATE_QUESTION_DOC),
        );
    registry
}

fn error_reply(status: u16, name: &str, description: &str) -> HandlerReply {
    HandlerReply::model(json!({
        "code": status,
        "name": name,
        "description": description,
    }))
    .with_status(status)
}

fn not_found(what: &str) -> HandlerReply {
    error_reply(404, "Not Found", &format!("{what} not found"))
}

fn path_id(req: &HandlerRequest) -> Option<i64> {
    req.get_path_param("id").and_then(|id| id.parse().ok())
}

fn token_user_id(req: &HandlerRequest) -> Option<i64> {
    req.get_header("authorization")?
        .strip_prefix("Token ")?
        .trim()
        .parse()
        .ok()
}

fn records<T: Record + Clone + 'static>(items: &[T]) -> RecordValue {
    RecordValue::List(items.iter().cloned().map(RecordValue::record).collect())
}

/// Register every demo handler, all sharing `store`.
pub fn register_handlers(dispatcher: &mut Dispatcher, store: Arc<Store>) {
    let s = Arc::clone(&store);
    dispatcher.register_handler("list_users", move |_req| {
        HandlerReply::model(records(&s.users()))
    });

    let s = Arc::clone(&store);
    dispatcher.register_handler("get_user", move |req| {
        match path_id(req).and_then(|id| s.user(id)) {
            Some(user) => HandlerReply::model(RecordValue::record(user)),
            None => not_found("User"),
        }
    });

    let s = Arc::clone(&store);
    dispatcher.register_handler("search_users", move |req| {
        let users: Vec<User> = req
            .get_query_param("email")
            .and_then(|email| s.user_by_email(email))
            .into_iter()
            .collect();
        HandlerReply::model(records(&users))
    });

    let s = Arc::clone(&store);
    dispatcher.register_handler("get_user_protobuf", move |req| {
        match path_id(req).and_then(|id| s.user(id)) {
            Some(user) => HandlerReply::protobuf(&UserMessage::from(&user)),
            None => not_found("User"),
        }
    });

    let s = Arc::clone(&store);
    dispatcher.register_handler("lookup_user", move |req| {
        let lookup = match req.protobuf::<UserLookup>() {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(request_id = %req.request_id, error = %e, "Undecodable lookup body");
                return error_reply(400, "Bad Request", &format!("Invalid UserLookup: {e}"));
            }
        };
        match s.user(lookup.id) {
            Some(user) => HandlerReply::protobuf(&UserMessage::from(&user)),
            None => not_found("User"),
        }
    });

    let s = Arc::clone(&store);
    dispatcher.register_handler("current_user", move |req| {
        match token_user_id(req).and_then(|id| s.user(id)) {
            Some(user) => HandlerReply::model(RecordValue::record(user)),
            None => error_reply(
                401,
                "Unauthorized",
                "Authentication header missing or invalid",
            ),
        }
    });

    let s = Arc::clone(&store);
    dispatcher.register_handler("list_cycle_days", move |req| {
        let Some(id) = path_id(req).filter(|id| s.user(*id).is_some()) else {
            return not_found("User");
        };
        HandlerReply::model(records(&s.cycle_days(id)))
    });

    let s = Arc::clone(&store);
    dispatcher.register_handler("list_questions", move |req| {
        let questions = s.questions(req.get_query_param("quiz"));
        let redact = req
            .get_query_param("redact")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if redact {
            let redacted: Vec<RecordValue> = questions
                .into_iter()
                .map(|q| RecordValue::record(Redacted(q)))
                .collect();
            HandlerReply::model(RecordValue::List(redacted))
        } else {
            HandlerReply::model(records(&questions))
        }
    });

    let s = Arc::clone(&store);
    dispatcher.register_handler("create_question", move |req| {
        let body = match req.json_body() {
            Ok(body) => camel_to_snake_keys(body),
            Err(e) => return error_reply(400, "Bad Request", &e.to_string()),
        };
        let Some(new) = NewQuestion::from_json(&body) else {
            return error_reply(400, "Bad Request", "Incomplete question");
        };
        let question = s.add_question(new, token_user_id(req));
        info!(question_id = question.id, quiz = %question.quiz, "Question created");
        HandlerReply::model(RecordValue::record(question)).with_status(201)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_document_parses() {
        let doc = base_document().unwrap();
        assert_eq!(doc["swagger"], json!("2.0"));
        assert!(doc["definitions"]["ErrorResponse"].is_object());
    }

    #[test]
    fn test_store_queries() {
        let store = Store::seeded();
        assert_eq!(store.users().len(), 2);
        assert_eq!(store.user_by_email("ADA@example.com").unwrap().id, 1);
        assert_eq!(store.cycle_days(1).len(), 2);
        assert!(store.cycle_days(2).is_empty());
        assert_eq!(store.questions(Some("rust")).len(), 1);
        assert_eq!(store.questions(None).len(), 2);
    }

    #[test]
    fn test_add_question_assigns_next_id() {
        let store = Store::seeded();
        let body = json!({
            "quiz": "rust",
            "title": "t",
            "answer1": "a",
            "answer2": "b",
            "correct_answer": 2
        });
        let q = store.add_question(NewQuestion::from_json(&body).unwrap(), None);
        assert_eq!(q.id, 3);
        assert_eq!(q.answers[2], None);
    }

    #[test]
    fn test_redacted_hides_answer() {
        let q = Store::seeded().questions(Some("rust")).remove(0);
        let redacted = Redacted(q);
        assert!(redacted.get("correct_answer").is_none());
        assert!(redacted.get("title").is_some());
        assert!(redacted.fields().iter().all(|(n, _)| n != "correct_answer"));
    }

    #[test]
    fn test_seeded_cycle_days_use_known_choices() {
        let store = Store::seeded();
        for day in store.cycle_days(1) {
            if let Some(value) = day.cervical_mucus {
                assert!(CERVICAL_MUCUS_CHOICES.contains(&value.as_str()));
            }
        }
    }

    #[test]
    fn test_registry_routes() {
        let registry = registry("/api/v1/");
        assert_eq!(registry.len(), 9);
        assert!(registry
            .iter()
            .all(|r| r.path.starts_with("/api/v1/") && r.doc.is_some()));
    }
}
