use std::{
    io,
    process::{Command, Stdio},
    rc::Rc,
    sync::Arc,
    time::Duration,
};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    prelude::*,
    symbols::border,
    widgets::{block::*, *},
};
use tokio::sync::watch;

use crate::{
    error::AppResult,
    gateway::Gateway,
    router::{History, PathRouter, Route},
    session,
    storage::LocalStorage,
    theme::{Theme, ThemeState},
    tui,
    views::{comments::CommentThread, feed::SongList, notice::NoticeQueue, upload::UploadForm},
};

/// Everything a key press can ask the app to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    /// Full navigation: assign the location and remount.
    Navigate(String),
    Back,
    Forward,
    Reload,
    ToggleTheme,
    OpenUpload,
    CloseUpload,
    SubmitUpload,
    OpenComments(usize),
    CloseComments,
    SubmitComment,
    ToggleLike(usize),
    PlayAudio(usize),
    DismissNotice,
}

// App owns the reactive cells (path and theme) and the state of every view
pub struct App {
    gateway: Arc<dyn Gateway>,
    storage: LocalStorage,
    session_id: String,
    history: History,
    router: PathRouter,
    theme: ThemeState,
    theme_rx: watch::Receiver<Theme>,
    songs: SongList,
    comments: Option<CommentThread>,
    upload: Option<UploadForm>,
    notices: NoticeQueue,
    page_loads: u64,
    exit: bool,
}

impl App {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        mut storage: LocalStorage,
        initial_path: &str,
    ) -> AppResult<Self> {
        let session_id = session::session_id(&mut storage)?;
        let theme = ThemeState::load(&storage);
        let theme_rx = theme.subscribe();
        let history = History::new(initial_path);
        let router = PathRouter::new(&history);
        let songs = SongList::new(router.route());
        tracing::info!("Session {} starting at {}", session_id, initial_path);

        Ok(Self {
            gateway,
            storage,
            session_id,
            history,
            router,
            theme,
            theme_rx,
            songs,
            comments: None,
            upload: None,
            notices: NoticeQueue::default(),
            page_loads: 0,
            exit: false,
        })
    }

    /// runs the application's main loop until the user quits
    pub async fn run(&mut self, terminal: &mut tui::Tui) -> io::Result<()> {
        self.mount().await;
        while !self.exit {
            terminal.draw(|frame| self.render(frame))?;
            if event::poll(Duration::from_millis(250))? {
                if let Event::Key(key_event) = event::read()? {
                    if key_event.kind == KeyEventKind::Press {
                        if let Some(action) = self.handle_key(key_event) {
                            self.perform(action).await;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// A fresh page load: re-read the location and rebuild every view.
    pub async fn mount(&mut self) {
        self.page_loads += 1;
        self.router = PathRouter::new(&self.history);
        self.comments = None;
        self.upload = None;
        self.reload_songs().await;
    }

    pub async fn navigate(&mut self, path: &str) {
        tracing::info!("Navigating to {}", path);
        self.history.assign(path);
        self.mount().await;
    }

    /// Reloads the current location. History is left as it is.
    pub async fn reload(&mut self) {
        tracing::info!("Reloading {}", self.history.location());
        self.mount().await;
    }

    pub async fn back(&mut self) {
        if self.history.back() {
            self.apply_pop().await;
        }
    }

    pub async fn forward(&mut self) {
        if self.history.forward() {
            self.apply_pop().await;
        }
    }

    async fn apply_pop(&mut self) {
        if self.router.sync() {
            self.comments = None;
            self.reload_songs().await;
        }
    }

    /// Loads songs for the current route. The same route reloads in place so a failed fetch keeps the cards.
    async fn reload_songs(&mut self) {
        let route = self.router.route();
        if *self.songs.route() != route {
            self.songs = SongList::new(route);
        }
        let gateway = Arc::clone(&self.gateway);
        if let Err(err) = self.songs.load(gateway.as_ref(), &self.session_id).await {
            self.notices.push(err.notice());
        }
    }

    pub fn handle_key(&mut self, key_event: KeyEvent) -> Option<Action> {
        if self.notices.current().is_some() {
            return match key_event.code {
                KeyCode::Enter | KeyCode::Esc => Some(Action::DismissNotice),
                _ => None,
            };
        }
        if let Some(form) = self.upload.as_mut() {
            return form.handle_key(key_event);
        }
        if let Some(thread) = self.comments.as_mut() {
            return thread.handle_key(key_event);
        }
        match key_event.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('t') => Some(Action::ToggleTheme),
            KeyCode::Char('u') => Some(Action::OpenUpload),
            KeyCode::Char('g') => Some(Action::Navigate("/".to_owned())),
            KeyCode::Char('r') => Some(Action::Reload),
            KeyCode::Char('b') => Some(Action::Back),
            KeyCode::Char('f') => Some(Action::Forward),
            _ => self.songs.handle_key(key_event),
        }
    }

    pub async fn perform(&mut self, action: Action) {
        let gateway = Arc::clone(&self.gateway);
        match action {
            Action::Quit => self.exit = true,
            Action::Navigate(path) => self.navigate(&path).await,
            Action::Back => self.back().await,
            Action::Forward => self.forward().await,
            Action::Reload => self.reload().await,
            Action::ToggleTheme => {
                if let Err(err) = self.theme.toggle(&mut self.storage) {
                    tracing::error!("Error saving theme: {}", err);
                    self.notices.push(err.notice("save theme"));
                }
            }
            Action::OpenUpload => self.upload = Some(UploadForm::new()),
            Action::CloseUpload => self.upload = None,
            Action::SubmitUpload => {
                let Some(form) = self.upload.as_mut() else {
                    return;
                };
                match form.submit(gateway.as_ref()).await {
                    Ok(_) => {
                        self.notices.push("Song uploaded successfully!");
                        self.reload().await;
                    }
                    Err(err) => self.notices.push(err.notice("upload song")),
                }
            }
            Action::OpenComments(index) => {
                let Some(card) = self.songs.cards().get(index) else {
                    return;
                };
                let mut thread = CommentThread::new(index, &card.song);
                if let Err(err) = thread.load(gateway.as_ref()).await {
                    self.notices.push(err.notice("load comments"));
                }
                self.comments = Some(thread);
            }
            Action::CloseComments => self.comments = None,
            Action::SubmitComment => {
                let Some(thread) = self.comments.as_mut() else {
                    return;
                };
                match thread.submit(gateway.as_ref()).await {
                    Ok(_) => {
                        if let Some(card) = self.songs.card_mut(thread.card_index()) {
                            card.comment_added();
                        }
                        if let Err(err) = thread.load(gateway.as_ref()).await {
                            self.notices.push(err.notice("load comments"));
                        }
                    }
                    Err(err) => self.notices.push(err.notice("add comment")),
                }
            }
            Action::ToggleLike(index) => {
                let Some(card) = self.songs.card_mut(index) else {
                    return;
                };
                if let Err(err) = card.toggle_like(gateway.as_ref(), &self.session_id).await {
                    tracing::error!("Error toggling like: {}", err);
                    self.notices.push(err.notice("update like"));
                }
            }
            Action::PlayAudio(index) => {
                let Some(card) = self.songs.cards().get(index) else {
                    return;
                };
                if let Err(err) = open_in_player(&card.song.audio_url) {
                    tracing::error!("Error opening {}: {}", card.song.audio_url, err);
                    self.notices.push("Failed to play song. Please try again.");
                }
            }
            Action::DismissNotice => {
                self.notices.dismiss();
            }
        }
    }

    pub fn render(&self, frame: &mut Frame) {
        let theme = *self.theme_rx.borrow();
        let palette = theme.palette();
        frame.render_widget(
            Block::default().style(Style::new().fg(palette.fg).bg(palette.bg)),
            frame.size(),
        );

        let layout = get_layout(frame);
        let brand = Title::from(" TOKA ".fg(palette.accent).bold());
        let controls = Title::from(Line::from(vec![
            " Upload ".into(),
            "<u>".fg(palette.accent).bold(),
            format!(" Theme: {} ", theme.as_str()).into(),
            "<t> ".fg(palette.accent).bold(),
        ]));
        let header = Block::default()
            .borders(Borders::ALL)
            .border_set(border::THICK)
            .border_style(Style::new().fg(palette.muted))
            .title(brand.alignment(Alignment::Left))
            .title(controls.alignment(Alignment::Right));
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                " ".into(),
                self.router.path().fg(palette.muted),
            ]))
            .block(header),
            layout[0],
        );

        self.songs.render(frame, layout[1], palette);

        let instructions = Line::from(vec![
            " Move ".into(),
            "<j/k>".fg(palette.accent).bold(),
            " Like ".into(),
            "<l>".fg(palette.accent).bold(),
            " Comments ".into(),
            "<c>".fg(palette.accent).bold(),
            " Profile ".into(),
            "<o>".fg(palette.accent).bold(),
            " Play ".into(),
            "<p>".fg(palette.accent).bold(),
            " Home ".into(),
            "<g>".fg(palette.accent).bold(),
            " Back ".into(),
            "<b>".fg(palette.accent).bold(),
            " Forward ".into(),
            "<f>".fg(palette.accent).bold(),
            " Quit ".into(),
            "<q> ".fg(palette.accent).bold(),
        ]);
        frame.render_widget(
            Paragraph::new(instructions).alignment(Alignment::Center),
            layout[2],
        );

        if let Some(form) = &self.upload {
            form.render(frame, palette);
        }
        if let Some(thread) = &self.comments {
            thread.render(frame, palette);
        }
        self.notices.render(frame, palette);
    }

    pub fn songs(&self) -> &SongList {
        &self.songs
    }

    pub fn route(&self) -> Route {
        self.router.route()
    }

    pub fn path(&self) -> String {
        self.router.path()
    }

    pub fn page_loads(&self) -> u64 {
        self.page_loads
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn theme(&self) -> Theme {
        self.theme.get()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notices.current()
    }

    pub fn upload_form_mut(&mut self) -> Option<&mut UploadForm> {
        self.upload.as_mut()
    }

    pub fn comment_thread(&self) -> Option<&CommentThread> {
        self.comments.as_ref()
    }

    pub fn comment_thread_mut(&mut self) -> Option<&mut CommentThread> {
        self.comments.as_mut()
    }

    pub fn is_running(&self) -> bool {
        !self.exit
    }
}

fn get_layout(frame: &Frame) -> Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.size())
}

/// Hands the audio URL to the platform's default opener.
fn open_in_player(url: &str) -> io::Result<()> {
    let mut command = match std::env::consts::OS {
        "linux" | "freebsd" | "openbsd" | "netbsd" => Command::new("xdg-open"),
        "macos" => Command::new("open"),
        "windows" => {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", ""]);
            command
        }
        os => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("Unsupported operating system: {os}"),
            ))
        }
    };
    command
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::flaky::{FlakyGateway, Op};
    use crate::gateway::SqliteGateway;
    use crate::song::NewSong;
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    type TestGateway = FlakyGateway<SqliteGateway>;

    async fn app_at(path: &str) -> (App, Arc<TestGateway>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = Arc::new(FlakyGateway::new(
            SqliteGateway::in_memory(&tmp.path().join("blobs"))
                .await
                .unwrap(),
        ));
        for (title, author_name) in [("Paranoid", "Black Sabbath"), ("Intro", "Jane Doe")] {
            gateway
                .insert_song(&NewSong {
                    title: title.into(),
                    author_name: author_name.into(),
                    audio_url: format!("file:///{title}.mp3"),
                })
                .await
                .unwrap();
        }
        let app = App::new(gateway.clone(), LocalStorage::in_memory(), path).unwrap();
        (app, gateway, tmp)
    }

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| app.render(frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[tokio::test]
    async fn mount_renders_feed() {
        let (mut app, _gateway, _tmp) = app_at("/").await;
        app.mount().await;
        assert_eq!(app.page_loads(), 1);
        assert_eq!(app.songs().cards().len(), 2);

        let screen = screen(&app);
        assert!(screen.contains("TOKA"));
        assert!(screen.contains("Discover Music"));
        assert!(screen.contains("Intro"));
    }

    #[tokio::test]
    async fn author_link_performs_full_navigation() {
        let (mut app, _gateway, _tmp) = app_at("/").await;
        app.mount().await;

        // Newest first, so "Intro" by Jane Doe is selected.
        let action = app.handle_key(key(KeyCode::Char('o'))).unwrap();
        assert_eq!(action, Action::Navigate("/profile/Jane%20Doe".into()));
        app.perform(action).await;

        assert_eq!(app.page_loads(), 2);
        assert_eq!(
            app.route(),
            Route::Profile {
                author_name: "Jane Doe".into()
            }
        );
        assert_eq!(app.songs().cards().len(), 1);
        assert!(screen(&app).contains("1 song"));
    }

    #[tokio::test]
    async fn back_and_forward_update_route_without_remount() {
        let (mut app, _gateway, _tmp) = app_at("/").await;
        app.mount().await;
        app.navigate("/profile/Jane%20Doe").await;
        assert_eq!(app.page_loads(), 2);

        app.perform(Action::Back).await;
        assert_eq!(app.path(), "/");
        assert_eq!(app.route(), Route::Feed);
        assert_eq!(app.songs().cards().len(), 2);

        app.perform(Action::Forward).await;
        assert_eq!(app.path(), "/profile/Jane%20Doe");
        assert_eq!(
            app.route(),
            Route::Profile {
                author_name: "Jane Doe".into()
            }
        );
        assert_eq!(app.page_loads(), 2);
    }

    #[tokio::test]
    async fn like_key_toggles_selected_card() {
        let (mut app, gateway, _tmp) = app_at("/").await;
        app.mount().await;
        let song_id = app.songs().cards()[0].song.id.clone();

        let action = app.handle_key(key(KeyCode::Char('l'))).unwrap();
        app.perform(action).await;
        assert_eq!(app.songs().cards()[0].likes(), 1);
        assert_eq!(gateway.count_reactions(&song_id).await.unwrap(), 1);

        app.perform(Action::ToggleLike(0)).await;
        assert_eq!(app.songs().cards()[0].likes(), 0);
        assert_eq!(gateway.count_reactions(&song_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn comment_submit_bumps_card_counter() {
        let (mut app, _gateway, _tmp) = app_at("/").await;
        app.mount().await;
        app.perform(Action::OpenComments(0)).await;
        assert!(screen(&app).contains("No comments yet. Be the first to comment!"));

        let thread = app.comment_thread_mut().unwrap();
        thread.author_box.set_input("Jane");
        thread.content_box.set_input("Great intro");
        app.perform(Action::SubmitComment).await;

        assert_eq!(app.notice(), None);
        assert_eq!(app.comment_thread().unwrap().comments().len(), 1);
        assert_eq!(app.songs().cards()[0].comment_count(), 1);
    }

    #[tokio::test]
    async fn empty_comment_shows_notice_and_blocks_keys() {
        let (mut app, _gateway, _tmp) = app_at("/").await;
        app.mount().await;
        app.perform(Action::OpenComments(0)).await;
        app.perform(Action::SubmitComment).await;

        assert_eq!(app.notice(), Some("Please fill in all fields"));
        assert_eq!(app.handle_key(key(KeyCode::Char('q'))), None);
        let dismiss = app.handle_key(key(KeyCode::Enter)).unwrap();
        app.perform(dismiss).await;
        assert_eq!(app.notice(), None);
        assert_eq!(app.songs().cards()[0].comment_count(), 0);
    }

    #[tokio::test]
    async fn upload_success_reloads_current_location() {
        let (mut app, _gateway, tmp) = app_at("/").await;
        app.mount().await;
        let path = tmp.path().join("new.mp3");
        std::fs::write(&path, b"RIFF").unwrap();

        app.perform(Action::OpenUpload).await;
        let form = app.upload_form_mut().unwrap();
        form.title_box.set_input("Fresh");
        form.author_box.set_input("Jane Doe");
        form.file_box.set_input(&path.to_string_lossy());
        app.perform(Action::SubmitUpload).await;

        assert_eq!(app.notice(), Some("Song uploaded successfully!"));
        assert!(app.upload_form_mut().is_none());
        assert_eq!(app.page_loads(), 2);
        assert_eq!(app.songs().cards()[0].song.title, "Fresh");
    }

    #[tokio::test]
    async fn theme_toggle_is_applied() {
        let (mut app, _gateway, _tmp) = app_at("/").await;
        assert_eq!(app.theme(), Theme::Light);
        app.perform(Action::ToggleTheme).await;
        assert_eq!(app.theme(), Theme::Dark);
        assert!(screen(&app).contains("Theme: dark"));
    }

    #[tokio::test]
    async fn quit_stops_the_loop() {
        let (mut app, _gateway, _tmp) = app_at("/").await;
        let action = app.handle_key(key(KeyCode::Char('q'))).unwrap();
        app.perform(action).await;
        assert!(!app.is_running());
    }

    fn fill_upload_form(app: &mut App, tmp: &tempfile::TempDir) {
        let path = tmp.path().join("take.mp3");
        std::fs::write(&path, b"ID3").unwrap();
        let form = app.upload_form_mut().unwrap();
        form.title_box.set_input("Take Two");
        form.author_box.set_input("Jane Doe");
        form.file_box.set_input(&path.to_string_lossy());
    }

    #[tokio::test]
    async fn reload_leaves_history_alone() {
        let (mut app, _gateway, _tmp) = app_at("/").await;
        app.mount().await;
        app.perform(Action::Navigate("/profile/Jane%20Doe".into())).await;

        app.perform(Action::Reload).await;
        assert_eq!(app.page_loads(), 3);
        assert_eq!(app.path(), "/profile/Jane%20Doe");

        app.perform(Action::Back).await;
        assert_eq!(app.path(), "/");
        assert_eq!(app.route(), Route::Feed);
    }

    #[tokio::test]
    async fn back_after_upload_returns_to_previous_page() {
        let (mut app, _gateway, tmp) = app_at("/").await;
        app.mount().await;
        app.perform(Action::Navigate("/profile/Jane%20Doe".into())).await;
        app.perform(Action::OpenUpload).await;
        fill_upload_form(&mut app, &tmp);
        app.perform(Action::SubmitUpload).await;

        assert_eq!(app.notice(), Some("Song uploaded successfully!"));
        assert_eq!(app.songs().cards().len(), 2);
        app.perform(Action::DismissNotice).await;
        app.perform(Action::Back).await;
        assert_eq!(app.path(), "/");
    }

    #[tokio::test]
    async fn failed_song_fetch_notifies_and_keeps_cards() {
        let (mut app, gateway, _tmp) = app_at("/").await;
        app.mount().await;

        gateway.fail(Op::ListSongs);
        app.perform(Action::Reload).await;
        assert_eq!(app.notice(), Some("Failed to load songs. Please try again."));
        assert_eq!(app.songs().cards().len(), 2);
        assert!(screen(&app).contains("Paranoid"));
    }

    #[tokio::test]
    async fn failed_counter_fetch_has_its_own_notice() {
        let (mut app, gateway, _tmp) = app_at("/").await;
        gateway.fail(Op::CountReactions);
        app.mount().await;

        assert_eq!(
            app.notice(),
            Some("Failed to load song details. Please try again.")
        );
        assert_eq!(app.songs().cards().len(), 2);
    }

    #[tokio::test]
    async fn failed_comment_insert_keeps_inputs_and_counter() {
        let (mut app, gateway, _tmp) = app_at("/").await;
        app.mount().await;
        app.perform(Action::OpenComments(0)).await;
        let thread = app.comment_thread_mut().unwrap();
        thread.author_box.set_input("Jane");
        thread.content_box.set_input("Great intro");

        gateway.fail(Op::InsertComment);
        app.perform(Action::SubmitComment).await;

        assert_eq!(app.notice(), Some("Failed to add comment. Please try again."));
        let thread = app.comment_thread().unwrap();
        assert_eq!(thread.author_box.input(), "Jane");
        assert_eq!(thread.content_box.input(), "Great intro");
        assert!(thread.comments().is_empty());
        assert_eq!(app.songs().cards()[0].comment_count(), 0);
    }

    #[tokio::test]
    async fn failed_song_insert_reports_and_leaves_blob() {
        let (mut app, gateway, tmp) = app_at("/").await;
        app.mount().await;
        app.perform(Action::OpenUpload).await;
        fill_upload_form(&mut app, &tmp);

        gateway.fail(Op::InsertSong);
        app.perform(Action::SubmitUpload).await;

        assert_eq!(app.notice(), Some("Failed to upload song. Please try again."));
        assert_eq!(app.upload_form_mut().unwrap().title_box.input(), "Take Two");
        assert_eq!(gateway.inner().list_songs().await.unwrap().len(), 2);
        let blobs = std::fs::read_dir(gateway.inner().blob_dir()).unwrap().count();
        assert_eq!(blobs, 1);
        assert_eq!(app.page_loads(), 1);
    }
}
