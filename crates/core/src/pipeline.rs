//! 파이프라인 trait — 모듈 확장 포인트 정의
//!
//! - [`Pipeline`]: start/stop/health_check 생명주기
//! - [`LineParser`]: 원시 텍스트 라인을 [`LogLine`]으로 파싱
//! - [`EventBus`]: 토픽 기반 발행/구독

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::PaylensError;
use crate::event::DecodedEvent;
use crate::types::LogLine;

/// 컴포넌트 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 동작은 하지만 성능 저하
    Degraded(String),
    /// 동작하지 않음
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 생명주기를 가진 처리 파이프라인
///
/// 데몬은 이 trait을 통해 파이프라인을 시작하고 정지합니다.
pub trait Pipeline: Send {
    /// 백그라운드 처리를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), PaylensError>> + Send;

    /// 처리를 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), PaylensError>> + Send;

    /// 현재 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 로그 라인 파서 trait
///
/// 새로운 로그 형식을 지원하려면 이 trait을 구현합니다.
pub trait LineParser: Send + Sync {
    /// 지원하는 로그 형식 이름
    fn format_name(&self) -> &str;

    /// 원시 텍스트 한 줄을 로그 라인으로 파싱
    fn parse(&self, raw: &str) -> Result<LogLine, PaylensError>;
}

/// 이벤트 핸들러
///
/// 발행하는 쪽의 실행 흐름에서 동기적으로 호출됩니다.
pub type EventHandler = Arc<dyn Fn(&DecodedEvent) + Send + Sync>;

/// 토픽 기반 이벤트 버스
pub trait EventBus: Send + Sync {
    /// 토픽의 모든 구독자에게 이벤트를 전달합니다.
    ///
    /// 구독자가 없으면 아무 일도 하지 않습니다. 전달된 핸들러 수를 반환합니다.
    fn publish(&self, topic: &str, event: &DecodedEvent) -> usize;

    /// 토픽에 핸들러를 등록합니다.
    fn subscribe(&self, topic: &str, handler: EventHandler);
}
