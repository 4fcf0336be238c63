use chrono::{NaiveDate, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ServiceError, ServiceResult};
use crate::models::live_session::{
    CreateLiveSessionRequest, LiveSession, LiveSessionResponse, SessionStatus,
};
use crate::models::require_id;
use crate::store::{Store, StoreError};

pub struct LiveSessionService {
    store: Store,
}

impl LiveSessionService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Schedules a session. A second session with the same topic, batch and date is a
    /// conflict.
    pub async fn create_session(
        &self,
        req: CreateLiveSessionRequest,
    ) -> ServiceResult<LiveSessionResponse> {
        req.validate()?;
        require_id("topic", &req.topic)?;
        require_id("batch", &req.batch)?;

        if self
            .store
            .live_sessions
            .occurrence_exists(&req.topic, &req.batch, req.date)
            .await?
        {
            return Err(Self::duplicate(&req.topic, &req.batch, req.date));
        }

        let session = LiveSession {
            id: Uuid::new_v4().to_string(),
            topic: req.topic,
            batch: req.batch,
            date: req.date,
            time: req.time,
            recurs_weekly: req.recurs_weekly,
            meeting_link: req.meeting_link,
            status: SessionStatus::Scheduled,
            created_at: Utc::now(),
        };

        match self.store.live_sessions.insert_session(&session).await {
            Ok(()) => {}
            Err(StoreError::DuplicateKey(_)) => {
                return Err(Self::duplicate(&session.topic, &session.batch, session.date));
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            session_id = %session.id,
            topic = %session.topic,
            batch = %session.batch,
            date = %session.date,
            recurs_weekly = session.recurs_weekly,
            "Live session scheduled"
        );
        Ok(session.into())
    }

    pub async fn get_session(&self, session_id: &str) -> ServiceResult<LiveSessionResponse> {
        require_id("session_id", session_id)?;
        self.store
            .live_sessions
            .find_session(session_id)
            .await?
            .map(LiveSessionResponse::from)
            .ok_or_else(|| ServiceError::NotFound(format!("live session {}", session_id)))
    }

    /// Sessions of a batch in calendar order, optionally starting at `from`.
    pub async fn list_sessions(
        &self,
        batch: &str,
        from: Option<NaiveDate>,
    ) -> ServiceResult<Vec<LiveSessionResponse>> {
        require_id("batch", batch)?;
        let sessions = self.store.live_sessions.list_sessions(batch, from).await?;
        Ok(sessions.into_iter().map(LiveSessionResponse::from).collect())
    }

    /// Moves a session along its lifecycle. The session date never changes.
    pub async fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> ServiceResult<LiveSessionResponse> {
        let current = self.get_session(session_id).await?;

        if current.status.is_terminal() {
            return Err(ServiceError::InvalidArgument(format!(
                "live session {} is already {}",
                session_id,
                current.status.as_str()
            )));
        }
        if !current.status.can_transition_to(status) {
            return Err(ServiceError::InvalidArgument(format!(
                "cannot move live session from {} to {}",
                current.status.as_str(),
                status.as_str()
            )));
        }

        if !self.store.live_sessions.set_status(session_id, status).await? {
            return Err(ServiceError::NotFound(format!("live session {}", session_id)));
        }

        tracing::info!(
            session_id,
            from = current.status.as_str(),
            to = status.as_str(),
            "Live session status changed"
        );
        Ok(LiveSessionResponse { status, ..current })
    }

    fn duplicate(topic: &str, batch: &str, date: NaiveDate) -> ServiceError {
        ServiceError::Conflict(format!(
            "live session '{}' for batch {} already exists on {}",
            topic, batch, date
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::memory_store;
    use chrono::NaiveTime;

    fn request(topic: &str, date: NaiveDate) -> CreateLiveSessionRequest {
        CreateLiveSessionRequest {
            topic: topic.to_string(),
            batch: "b1".to_string(),
            date,
            time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            recurs_weekly: true,
            meeting_link: "https://meet.example.com/abc".to_string(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    #[tokio::test]
    async fn duplicate_occurrence_is_a_conflict() {
        let (_, store) = memory_store();
        let service = LiveSessionService::new(store);

        service.create_session(request("Async", day(1))).await.unwrap();
        assert!(matches!(
            service.create_session(request("Async", day(1))).await,
            Err(ServiceError::Conflict(_))
        ));
        service.create_session(request("Traits", day(1))).await.unwrap();
    }

    #[tokio::test]
    async fn lists_in_calendar_order() {
        let (_, store) = memory_store();
        let service = LiveSessionService::new(store);

        service.create_session(request("C", day(15))).await.unwrap();
        service.create_session(request("A", day(1))).await.unwrap();
        service.create_session(request("B", day(8))).await.unwrap();

        let all = service.list_sessions("b1", None).await.unwrap();
        let topics: Vec<&str> = all.iter().map(|s| s.topic.as_str()).collect();
        assert_eq!(topics, vec!["A", "B", "C"]);

        let upcoming = service.list_sessions("b1", Some(day(8))).await.unwrap();
        assert_eq!(upcoming.len(), 2);
        assert!(service.list_sessions("other", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_follows_lifecycle() {
        let (_, store) = memory_store();
        let service = LiveSessionService::new(store);
        let session = service.create_session(request("Async", day(1))).await.unwrap();

        let active = service
            .update_status(&session.id, SessionStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.status, SessionStatus::Active);
        assert_eq!(active.date, day(1));

        service
            .update_status(&session.id, SessionStatus::Completed)
            .await
            .unwrap();
        match service.update_status(&session.id, SessionStatus::Scheduled).await {
            Err(ServiceError::InvalidArgument(message)) => {
                assert!(message.contains("already completed"), "{}", message)
            }
            other => panic!("expected InvalidArgument, got {:?}", other.map(|s| s.status)),
        }
        let active = service.create_session(request("Traits", day(2))).await.unwrap();
        service
            .update_status(&active.id, SessionStatus::Active)
            .await
            .unwrap();
        match service.update_status(&active.id, SessionStatus::Scheduled).await {
            Err(ServiceError::InvalidArgument(message)) => {
                assert!(message.contains("from active to scheduled"), "{}", message)
            }
            other => panic!("expected InvalidArgument, got {:?}", other.map(|s| s.status)),
        }
        assert!(matches!(
            service.update_status("missing", SessionStatus::Active).await,
            Err(ServiceError::NotFound(_))
        ));

        let stored = service.get_session(&session.id).await.unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
    }
}
