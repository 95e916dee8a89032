use crate::{AppState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let before = state.view();
    let mut effects = match msg {
        Msg::Mounted => {
            if state.mounted {
                Vec::new()
            } else {
                state.mounted = true;
                state.connection.connect()
            }
        }
        Msg::Unmounted => {
            if !state.mounted {
                return (state, Vec::new());
            }
            state.mounted = false;
            let mut effects = state.tracker.unsubscribe(&mut state.connection);
            effects.extend(state.connection.disconnect());
            state.tracker.on_disconnected();
            effects.extend(state.adapter.stop_simulation());
            effects
        }
        Msg::ConnectRequested => state.connection.connect(),
        Msg::DisconnectRequested => {
            let mut effects = state.tracker.unsubscribe(&mut state.connection);
            effects.extend(state.connection.disconnect());
            state.tracker.on_disconnected();
            effects
        }
        Msg::TaskChanged { task_id, seed } => {
            if task_id == state.tracker.task_id() {
                Vec::new()
            } else {
                let mut effects = state
                    .tracker
                    .change_task(task_id.clone(), &seed, &mut state.connection);
                effects.extend(state.adapter.reset(task_id, &seed));
                effects
            }
        }
        Msg::PauseToggled => {
            state.adapter.toggle_pause();
            Vec::new()
        }
        Msg::TransportOpened { transport } => {
            let was_open = state.connection.is_connected();
            let mut effects = state.connection.handle_opened(transport);
            if !was_open && state.connection.is_connected() {
                effects.extend(state.tracker.on_connected(&mut state.connection));
            }
            effects
        }
        Msg::TransportClosed { transport } => match state.connection.handle_closed(transport) {
            Some(effects) => {
                state.tracker.on_disconnected();
                effects
            }
            None => Vec::new(),
        },
        Msg::TransportError { transport, error } => {
            state.connection.handle_error(transport, &error);
            Vec::new()
        }
        Msg::FrameReceived { transport, text } => {
            let changed = state
                .connection
                .handle_frame(transport, &text)
                .is_some_and(|message| state.tracker.apply(&message));
            if changed {
                state.adapter.apply_live(state.tracker.state())
            } else {
                Vec::new()
            }
        }
        Msg::ReconnectDue => state.connection.handle_reconnect_due(),
        Msg::HeartbeatDue => state.connection.handle_heartbeat_due(),
        Msg::SimulationTick { sample } => {
            if state.mounted {
                state
                    .adapter
                    .simulation_tick(sample, state.connection.is_connected());
            }
            Vec::new()
        }
    };

    if state.mounted {
        effects.extend(state.adapter.sync_simulation(state.connection.is_connected()));
    }
    if state.view() != before {
        state.mark_dirty();
    }

    (state, effects)
}
