use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{HttpApi, PullApi};
use crate::config::Config;
use crate::dispatch::{Action, Dispatcher, Flow, PullResult};
use crate::input::{self, parse_command};
use crate::poll::{PollDecision, PollScheduler};
use crate::reconcile;
use crate::state::AppState;
use crate::surface::{HtmlSurface, PageWriter};
use crate::transport::{PushChannel, PushEvent, PushEventKind, PushTransport, TransportSettings};
use crate::view::ConnectionIndicator;

const PUSH_QUEUE_CAPACITY: usize = 256;
const PULL_QUEUE_CAPACITY: usize = 64;
const ACTION_QUEUE_CAPACITY: usize = 32;
const PRUNE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub enum AppMsg {
    Push(PushEvent),
    Pull(PullResult),
    Action(Action),
    PollTick,
    Prune,
}

pub struct App<P: PushChannel> {
    pub state: AppState,
    pub surface: HtmlSurface,
    push: P,
    dispatcher: Dispatcher,
    poll: PollScheduler,
    page: Option<PageWriter>,
    dirty: bool,
}

impl<P: PushChannel> App<P> {
    pub fn new(
        config: &Config,
        api: Arc<dyn PullApi>,
        push: P,
        results: mpsc::Sender<PullResult>,
    ) -> Self {
        Self {
            state: AppState::default(),
            surface: HtmlSurface::default(),
            push,
            dispatcher: Dispatcher::new(api, results, config.notification_ttl),
            poll: PollScheduler::new(config.poll_interval),
            page: config.html_out.clone().map(PageWriter::new),
            dirty: true,
        }
    }

    pub fn push(&self) -> &P {
        &self.push
    }

    pub fn poll(&self) -> &PollScheduler {
        &self.poll
    }

    /// Initial table pull, then open the push channel.
    pub fn start(&mut self) {
        self.dispatcher.pull_table(&mut self.state);
        self.push.connect(false);
        self.dirty = true;
    }

    pub fn handle(&mut self, msg: AppMsg, now: DateTime<Utc>) -> Flow {
        match msg {
            AppMsg::Push(event) => self.handle_push(event),
            AppMsg::Pull(result) => {
                self.dispatcher
                    .complete(result, &mut self.state, &mut self.surface, now);
                self.dirty = true;
            }
            AppMsg::Action(action) => {
                let flow = self.dispatcher.dispatch(
                    action,
                    &mut self.state,
                    &mut self.surface,
                    &mut self.push,
                );
                self.dirty = true;
                return flow;
            }
            AppMsg::PollTick => match self.poll.on_tick(self.push.connected()) {
                PollDecision::Pull => {
                    debug!(event = "poll_pull");
                    self.dispatcher.pull_table(&mut self.state);
                    self.dirty = true;
                }
                PollDecision::Skip => debug!(event = "poll_skip"),
            },
            AppMsg::Prune => {
                if self.state.view.notifications.prune(now) {
                    self.dirty = true;
                }
            }
        }
        Flow::Continue
    }

    fn handle_push(&mut self, event: PushEvent) {
        if !self.push.observe(&event) {
            debug!(event = "push_stale", epoch = event.epoch);
            return;
        }
        match event.kind {
            PushEventKind::Connected => info!(event = "push_online", epoch = event.epoch),
            PushEventKind::Disconnected { reason } => {
                info!(event = "push_offline", epoch = event.epoch, reason = %reason)
            }
            PushEventKind::ConnectError(message) => {
                debug!(event = "push_connect_failed", epoch = event.epoch, error = %message)
            }
            PushEventKind::Server(server_event) => {
                debug!(event = "push_event", epoch = event.epoch, name = server_event.name());
                reconcile::apply_server_event(&mut self.state, &mut self.surface, server_event)
            }
        }
        self.dirty = true;
    }

    pub fn render(&mut self) {
        let indicator = ConnectionIndicator::from_connected(self.push.connected());
        if self.state.view.connection != indicator {
            self.state.view.connection = indicator;
            self.dirty = true;
        }
        if !self.dirty {
            return;
        }
        self.dirty = false;
        if let Some(page) = &self.page {
            if let Err(err) = page.write(&self.state.view, &self.surface) {
                warn!(event = "page_write_error", path = %page.path().display(), error = %err);
            }
        }
    }
}

fn spawn_stdin_reader(actions: mpsc::Sender<Action>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(event = "stdin_closed");
                    return;
                }
                Err(err) => {
                    warn!(event = "stdin_error", error = %err);
                    return;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Ok(action) => {
                    if actions.send(action).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    warn!(event = "input_error", error = %err);
                    eprintln!("{err}; {}", input::HELP);
                }
            }
        }
    });
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let api = HttpApi::new(config.server_url.clone(), config.request_timeout)
        .context("failed to build HTTP client")?;
    let settings = TransportSettings::from_config(&config).context("invalid push channel url")?;

    let (push_tx, mut push_rx) = mpsc::channel(PUSH_QUEUE_CAPACITY);
    let (pull_tx, mut pull_rx) = mpsc::channel(PULL_QUEUE_CAPACITY);
    let (action_tx, mut action_rx) = mpsc::channel(ACTION_QUEUE_CAPACITY);

    let transport = PushTransport::new(settings, push_tx);
    let mut app = App::new(&config, Arc::new(api), transport, pull_tx);
    info!(
        event = "dashboard_start",
        server = %config.server_url,
        poll_secs = config.poll_interval.as_secs(),
        html_out = ?config.html_out
    );

    spawn_stdin_reader(action_tx);
    app.start();

    let mut poll_ticker = app.poll().interval();
    let mut prune_ticker = tokio::time::interval(PRUNE_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        app.render();
        let msg = tokio::select! {
            Some(event) = push_rx.recv() => AppMsg::Push(event),
            Some(result) = pull_rx.recv() => AppMsg::Pull(result),
            Some(action) = action_rx.recv() => AppMsg::Action(action),
            _ = poll_ticker.tick() => AppMsg::PollTick,
            _ = prune_ticker.tick() => AppMsg::Prune,
            _ = &mut shutdown => {
                info!(event = "dashboard_interrupted");
                break;
            }
        };
        if app.handle(msg, Utc::now()) == Flow::Quit {
            info!(event = "dashboard_quit");
            break;
        }
    }
    app.render();
    Ok(())
}
