//! Static course catalog
//!
//! The catalog is read-only at runtime. A deployment either uses
//! [`Course::builtin`] or points `course_file` at a YAML document with the
//! same shape (see `config/course.example.yaml`).

use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// One unit of course content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Module {
    /// 0-based position, assigned when the catalog is validated
    #[serde(default)]
    pub index: usize,
    /// Course day the module belongs to
    pub day: u32,
    /// Emoji shown in menus
    #[serde(default)]
    pub emoji: String,
    /// Short title
    pub title: String,
    /// HTML body
    pub body: String,
    /// Practical task
    pub task: String,
    /// Telegram file id or local path of an audio version
    #[serde(default)]
    pub audio: Option<String>,
}

impl Module {
    /// 1-based number as shown to learners
    #[must_use]
    pub const fn number(&self) -> usize {
        self.index + 1
    }
}

/// One answer option of a quiz question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizOption {
    /// Option letter, e.g. "а"
    pub letter: String,
    /// Option text
    pub text: String,
}

/// A multiple-choice question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizQuestion {
    /// Stable id used as the key in recorded answers
    pub id: String,
    /// Question text
    pub prompt: String,
    /// Options in display order
    pub options: Vec<QuizOption>,
    /// Letter of the correct option
    pub correct: String,
}

impl QuizQuestion {
    /// Whether `letter` names one of the options
    #[must_use]
    pub fn has_option(&self, letter: &str) -> bool {
        self.options.iter().any(|o| o.letter == letter)
    }
}

/// External link shown on the links page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    /// Display name
    pub name: String,
    /// Target URL
    pub url: String,
}

/// Support contacts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Contacts {
    /// Support e-mail
    pub email: String,
    /// Office phone
    pub phone: String,
    /// Mobile phone
    #[serde(default)]
    pub mobile: String,
    /// Website
    #[serde(default)]
    pub site: String,
}

/// The whole static course
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Course {
    /// Course title
    pub title: String,
    /// HTML text of the "about" page
    #[serde(default)]
    pub about: String,
    /// Modules in order
    pub modules: Vec<Module>,
    /// Final quiz, may be empty
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
    /// Useful links
    #[serde(default)]
    pub links: Vec<Link>,
    /// Support contacts
    #[serde(default)]
    pub contacts: Contacts,
}

impl Course {
    /// Number of modules
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Module at a 0-based index
    #[must_use]
    pub fn module(&self, index: usize) -> Option<&Module> {
        self.modules.get(index)
    }

    /// Number of quiz questions
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Question at a 0-based index
    #[must_use]
    pub fn question(&self, index: usize) -> Option<&QuizQuestion> {
        self.questions.get(index)
    }

    /// Whether any module carries an audio reference
    #[must_use]
    pub fn has_audio(&self) -> bool {
        self.modules.iter().any(|m| m.audio.is_some())
    }

    /// Parse and validate a YAML catalog
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or the catalog is inconsistent.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, StorageError> {
        let course: Self = serde_yaml::from_str(yaml)?;
        course.validated()
    }

    /// Load the catalog from `path`, or the built-in one when no path is set
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub async fn load(path: Option<&Path>) -> Result<Self, StorageError> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };
        let yaml = tokio::fs::read_to_string(path).await?;
        let course = Self::from_yaml_str(&yaml)?;
        info!(
            "Loaded course '{}' from {} ({} modules, {} questions)",
            course.title,
            path.display(),
            course.module_count(),
            course.question_count()
        );
        Ok(course)
    }

    /// Check internal consistency and assign module indices
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidCourse` describing the first problem found.
    pub fn validated(mut self) -> Result<Self, StorageError> {
        if self.modules.is_empty() {
            return Err(StorageError::InvalidCourse("course has no modules".into()));
        }
        for (index, module) in self.modules.iter_mut().enumerate() {
            module.index = index;
        }

        let mut ids = HashSet::new();
        for q in &self.questions {
            if !ids.insert(q.id.as_str()) {
                return Err(StorageError::InvalidCourse(format!(
                    "duplicate question id '{}'",
                    q.id
                )));
            }
            if q.options.len() < 2 {
                return Err(StorageError::InvalidCourse(format!(
                    "question '{}' needs at least two options",
                    q.id
                )));
            }
            let mut letters = HashSet::new();
            if !q.options.iter().all(|o| letters.insert(o.letter.as_str())) {
                return Err(StorageError::InvalidCourse(format!(
                    "question '{}' repeats an option letter",
                    q.id
                )));
            }
            if !q.has_option(&q.correct) {
                return Err(StorageError::InvalidCourse(format!(
                    "question '{}' marks '{}' correct but has no such option",
                    q.id, q.correct
                )));
            }
        }
        Ok(self)
    }

    /// The "Тендеры с нуля" express course
    #[must_use]
    pub fn builtin() -> Self {
        let modules = vec![
            module(1, "📚", "Основы мира тендеров", MODULE_1, "Найти и изучить 2 тендера в вашей сфере деятельности"),
            module(2, "🏛️", "44-ФЗ — Главный 'коридор' для старта", MODULE_2, "Изучить документацию к одному аукциону по 44-ФЗ"),
            module(3, "🏢", "223-ФЗ — Мир возможностей и гибкости", MODULE_3, "Найти и изучить Положение о закупке компании по 223-ФЗ"),
            module(4, "💼", "Коммерческие тендеры — Работа с бизнесом", MODULE_4, "Составить список потенциальных заказчиков и зарегистрироваться на B2B-Center"),
            module(5, "🚀", "Практический старт — План на первые шаги", MODULE_5, "Составить личный план действий на первые 30 дней"),
        ];

        let questions = vec![
            question("1", "Какой закон регулирует закупки государственных заказчиков по жёстким правилам?", &[("а", "223-ФЗ"), ("б", "44-ФЗ"), ("в", "Гражданский кодекс")], "б"),
            question("2", "Кто устанавливает правила закупок по 223-ФЗ?", &[("а", "Сам заказчик в Положении о закупке"), ("б", "Федеральная антимонопольная служба"), ("в", "Электронная площадка")], "а"),
            question("3", "Как определяется победитель электронного аукциона по 44-ФЗ?", &[("а", "По лучшим условиям исполнения"), ("б", "По опыту участника"), ("в", "По самой низкой цене")], "в"),
            question("4", "Что нужно получить в первую очередь для участия в электронных торгах?", &[("а", "Банковскую гарантию"), ("б", "Электронную подпись"), ("в", "Лицензию ФАС")], "б"),
            question("5", "Обязан ли коммерческий заказчик заключить договор с победителем?", &[("а", "Нет, такой обязанности нет"), ("б", "Да, всегда"), ("в", "Только по 44-ФЗ")], "а"),
        ];

        let links = [
            ("ЕИС", "https://zakupki.gov.ru"),
            ("Госуслуги", "https://www.gosuslugi.ru"),
            ("B2B-Center", "https://www.b2b-center.ru"),
            ("КонсультантПлюс 44-ФЗ", "https://www.consultant.ru/document/cons_doc_LAW_144624/"),
            ("Удостоверяющий центр", "https://uc-itcom.ru"),
            ("Техподдержка курса", "https://tritika.ru"),
        ]
        .into_iter()
        .map(|(name, url)| Link {
            name: name.to_string(),
            url: url.to_string(),
        })
        .collect();

        let mut course = Self {
            title: "Тендеры с нуля".to_string(),
            about: ABOUT.to_string(),
            modules,
            questions,
            links,
            contacts: Contacts {
                email: "info@tritika.ru".to_string(),
                phone: "+7(4922)223-222".to_string(),
                mobile: "+7-904-653-69-87".to_string(),
                site: "https://tritika.ru".to_string(),
            },
        };

        for (index, m) in course.modules.iter_mut().enumerate() {
            m.index = index;
        }
        course
    }
}

fn module(day: u32, emoji: &str, title: &str, body: &str, task: &str) -> Module {
    Module {
        index: 0,
        day,
        emoji: emoji.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        task: task.to_string(),
        audio: None,
    }
}

fn question(id: &str, prompt: &str, options: &[(&str, &str)], correct: &str) -> QuizQuestion {
    QuizQuestion {
        id: id.to_string(),
        prompt: prompt.to_string(),
        options: options
            .iter()
            .map(|(letter, text)| QuizOption {
                letter: (*letter).to_string(),
                text: (*text).to_string(),
            })
            .collect(),
        correct: correct.to_string(),
    }
}

const ABOUT: &str = r"🎯 <b>Цель:</b> Подготовить участников к успешному участию в государственных и коммерческих тендерах.

<b>📅 Формат:</b>
• 5 дней интенсивного обучения
• 5 модулей с теорией и практикой
• Пошаговые инструкции и практические задания
• Итоговый тест

<b>👥 Для кого:</b>
• Начинающие предприниматели
• Специалисты по закупкам
• Фрилансеры
• Все, кто хочет начать работать с госзаказом

<b>Авторы:</b> Команда экспертов с многолетним опытом в госзакупках";

const MODULE_1: &str = r"✅ <b>Что такое тендер?</b>
Это конкурентная форма размещения заказов на поставку товаров, выполнение работ или оказание услуг, при которой заказчик выбирает исполнителя на основе заранее объявленных критериев.

✅ <b>Участники системы:</b>
• Заказчик — государство, госкомпания, бизнес
• Поставщик — компания (Вы)

✅ <b>Основные законы:</b>
• <b>44-ФЗ</b> — жесткие правила для госзаказчиков
• <b>223-ФЗ</b> — гибкие правила для госкомпаний
• <b>Коммерческие тендеры</b> — правила устанавливает компания

🔗 <b>Полезные ссылки:</b>
• 44-ФЗ: https://www.consultant.ru/document/cons_doc_LAW_144624/
• 223-ФЗ: https://www.consultant.ru/document/cons_doc_LAW_116964/
• ЕИС: https://zakupki.gov.ru

📝 <b>Как искать:</b>
1. Перейдите в раздел «Закупки»
2. Установите параметры поиска: 44-ФЗ, 223-ФЗ
3. Введите наименование интересующей вас закупки
4. Нажмите «Применить»

<code>Пример поиска: Поставка офисной мебели</code>";

const MODULE_2: &str = r"✅ <b>Ключевые способы закупок:</b>

<b>Конкурентные закупки:</b>
• Аукцион в электронной форме (побеждает самый дешевый)
• Конкурс в электронной форме (лучшие условия)
• Электронный запрос котировок (быстро, для небольших сумм)

<b>Неконкурентные:</b>
• Закупка у единственного поставщика
• Малые закупки до 600 тыс. руб.

✅ <b>Этапы участия:</b>
1. 📝 Электронная подпись (ЭП)
2. 🏢 Аккредитация на ЭТП
3. 🔍 Поиск закупки
4. 📄 Изучение документации
5. 💰 Обеспечение заявки (спецсчет или банковская гарантия)
6. 📤 Подача заявки
7. 🎯 Участие в процедуре
8. 🤝 Обеспечение контракта
9. ✍️ Заключение контракта";

const MODULE_3: &str = r"✅ <b>Главное отличие:</b>
1. У каждого заказчика своё <b>Положение о закупке</b>
2. Регулирует корпоративные закупки — заказы госкорпораций и крупного бизнеса

✅ <b>Способы закупок:</b>
• Любые (аукцион, запрос котировок, конкурс, запрос предложений)
• Правила определяет сам заказчик

✅ <b>Особенности:</b>
1. 🔍 Больше внимания качеству и репутации
2. 📊 Требуется предоставить релевантный опыт работы
3. 💵 Цена — не всегда решающий фактор
4. 🤝 Больше возможностей для переговоров

🔗 <b>Полезные ссылки:</b>
• Статья о 223-ФЗ: https://zakupki.kontur.ru/site/articles/22556-223fz2";

const MODULE_4: &str = r"✅ <b>Ключевые способы закупок:</b>

<b>Конкурентные:</b>
• Запрос предложений
• Аукционы
• Конкурсы

<b>Неконкурентные:</b>
• Прямые закупки у единственного поставщика
• Уникальные товары/услуги
• Срочные закупки

✅ <b>Где искать закупки:</b>
1. 🌐 Корпоративные порталы компаний (разделы «Закупки», «Для поставщиков»)
2. 🏪 Специализированные площадки: B2B-Center, СберАСТ, РТС-тендер
3. 🤝 Прямые контакты с отделом закупок

✅ <b>Особенности:</b>
1. ⭐ Ценится репутация и надежность
2. 💬 Больше переговоров и обсуждений
3. 📝 Меньше формальностей
4. ⚖️ Нет обязанности заключать контракт с победителем";

const MODULE_5: &str = r"✅ <b>Пошаговый план действий:</b>

1. <b>Получите ЭЦП</b> в аккредитованном УЦ (от 2 000 руб./год)
2. <b>Настройте рабочее место:</b> КриптоПРО CSP, Chromium-Gost, Рутокен
3. <b>Зарегистрируйтесь:</b> Госуслуги (ЕСИА), ЕИС, 5-8 электронных площадок
4. <b>Откройте спецсчет</b> для обеспечения заявок
5. <b>Настройте поиск</b> по вашим товарам/услугам

✅ <b>Начните с малого:</b>
1. Выберите 1-2 простых тендера (до 500 тыс. руб.)
2. Изучите ВСЮ документацию
3. Подготовьте заявку строго по требованиям
4. Не бойтесь задавать вопросы заказчику

❌ <b>Ключевые ошибки новичков:</b>
1. Пропустить требование в документации
2. Неправильно заполнить заявку
3. Опоздать с подачей
4. Не внести обеспечение

🎯 <b>Ваш первый тендер — это ценный опыт, даже если не победите!</b>";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_course_is_valid() -> Result<(), StorageError> {
        let course = Course::builtin().validated()?;
        assert_eq!(course.module_count(), 5);
        assert_eq!(course.question_count(), 5);
        for (i, m) in course.modules.iter().enumerate() {
            assert_eq!(m.index, i);
            assert_eq!(m.number(), i + 1);
        }
        assert!(!course.has_audio());
        Ok(())
    }

    #[test]
    fn test_yaml_assigns_indices() -> Result<(), StorageError> {
        let yaml = r#"
title: Demo
modules:
  - { day: 1, title: One, body: "b1", task: "t1" }
  - { day: 2, title: Two, body: "b2", task: "t2", audio: "AwACAgIAAxkBAAIB" }
questions:
  - id: "q1"
    prompt: "2+2?"
    options: [{ letter: "а", text: "4" }, { letter: "б", text: "5" }]
    correct: "а"
"#;
        let course = Course::from_yaml_str(yaml)?;
        assert_eq!(course.module(1).map(|m| m.index), Some(1));
        assert!(course.has_audio());
        assert!(course.links.is_empty());
        Ok(())
    }

    #[test]
    fn test_rejects_unknown_correct_letter() {
        let yaml = r#"
title: Demo
modules: [{ day: 1, title: One, body: "b", task: "t" }]
questions:
  - id: "q1"
    prompt: "?"
    options: [{ letter: "а", text: "x" }, { letter: "б", text: "y" }]
    correct: "г"
"#;
        assert!(matches!(
            Course::from_yaml_str(yaml),
            Err(StorageError::InvalidCourse(_))
        ));
    }

    #[test]
    fn test_rejects_empty_course() {
        assert!(matches!(
            Course::from_yaml_str("title: Empty\nmodules: []\n"),
            Err(StorageError::InvalidCourse(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_question_ids() {
        let mut course = Course::builtin();
        let dup = course.questions[0].clone();
        course.questions.push(dup);
        assert!(course.validated().is_err());
    }
}
